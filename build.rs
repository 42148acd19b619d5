use std::path::PathBuf;

/// 空 ZIP 包：只有一个 End of Central Directory 记录
const EMPTY_ZIP: [u8; 22] = [
    0x50, 0x4b, 0x05, 0x06, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
];

fn main() {
    // 安装包资源 `app` 在编译期嵌入二进制。
    // 优先使用 CINSTALLER_PAYLOAD 指定的文件，其次是 assets/app.zip；
    // 两者都不存在时写入空包，避免开发/CI 场景下编译失败。
    println!("cargo:rerun-if-env-changed=CINSTALLER_PAYLOAD");
    println!("cargo:rerun-if-changed=assets/app.zip");

    let manifest_dir = PathBuf::from(std::env::var("CARGO_MANIFEST_DIR").unwrap_or_default());
    let out_dir = PathBuf::from(std::env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));
    let target = out_dir.join("app.zip");

    let source = std::env::var_os("CINSTALLER_PAYLOAD")
        .map(PathBuf::from)
        .unwrap_or_else(|| manifest_dir.join("assets").join("app.zip"));

    if source.is_file() {
        std::fs::copy(&source, &target).expect("failed to copy installer payload");
    } else {
        std::fs::write(&target, EMPTY_ZIP).expect("failed to write empty payload");
    }
}
