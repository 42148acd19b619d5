//! 文件复制辅助函数

use std::fs;
use std::path::Path;

/// 递归复制目录，覆盖已存在的文件，返回复制的文件数
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<usize> {
    fs::create_dir_all(dst)?;
    let mut copied = 0;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if entry.file_type()?.is_dir() {
            copied += copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path)?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// 只复制 `src` 下一级的文件（不进入子目录），返回复制的文件数
pub fn copy_files(src: &Path, dst: &Path) -> std::io::Result<usize> {
    fs::create_dir_all(dst)?;
    let mut copied = 0;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            fs::copy(entry.path(), dst.join(entry.file_name()))?;
            copied += 1;
        }
    }
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_tree(root: &Path) {
        fs::create_dir_all(root.join("sub/deeper")).unwrap();
        fs::write(root.join("top.rb"), "top").unwrap();
        fs::write(root.join("sub/inner.rb"), "inner").unwrap();
        fs::write(root.join("sub/deeper/leaf.rb"), "leaf").unwrap();
    }

    #[test]
    fn test_copy_dir_recursive_copies_whole_tree() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        make_tree(src.path());

        let target = dst.path().join("out");
        let copied = copy_dir_recursive(src.path(), &target).unwrap();

        assert_eq!(copied, 3);
        assert_eq!(fs::read_to_string(target.join("sub/deeper/leaf.rb")).unwrap(), "leaf");
    }

    #[test]
    fn test_copy_dir_recursive_overwrites() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        make_tree(src.path());
        fs::write(dst.path().join("top.rb"), "old").unwrap();

        copy_dir_recursive(src.path(), dst.path()).unwrap();
        assert_eq!(fs::read_to_string(dst.path().join("top.rb")).unwrap(), "top");
    }

    #[test]
    fn test_copy_files_skips_directories() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        make_tree(src.path());

        let target = dst.path().join("addins");
        let copied = copy_files(src.path(), &target).unwrap();

        assert_eq!(copied, 1);
        assert!(target.join("top.rb").is_file());
        assert!(!target.join("sub").exists());
    }
}
