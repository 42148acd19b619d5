//! Windows 注册表存储
//!
//! 始终以 64 位视图访问，保证 32 位进程也能看到宿主程序写入的键。

use super::{ConfigStore, Hive, KeyPath, StoreError, StoreValue};
use std::io;
use winreg::enums::{
    RegType, HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE, KEY_READ, KEY_WOW64_64KEY, KEY_WRITE,
};
use winreg::types::FromRegValue;
use winreg::{RegKey, RegValue};

#[derive(Debug, Default)]
pub struct RegistryStore;

impl RegistryStore {
    pub fn new() -> Self {
        Self
    }

    fn root(hive: Hive) -> RegKey {
        match hive {
            Hive::LocalMachine => RegKey::predef(HKEY_LOCAL_MACHINE),
            Hive::CurrentUser => RegKey::predef(HKEY_CURRENT_USER),
        }
    }

    fn open(&self, key: &KeyPath) -> Result<RegKey, StoreError> {
        Self::root(key.hive)
            .open_subkey_with_flags(&key.path, KEY_READ | KEY_WOW64_64KEY)
            .map_err(|e| map_io(key, e))
    }

    fn create(&self, key: &KeyPath) -> Result<RegKey, StoreError> {
        let (reg_key, _) = Self::root(key.hive)
            .create_subkey_with_flags(&key.path, KEY_READ | KEY_WRITE | KEY_WOW64_64KEY)
            .map_err(|e| map_io(key, e))?;
        Ok(reg_key)
    }
}

fn map_io(key: &KeyPath, err: io::Error) -> StoreError {
    match err.kind() {
        io::ErrorKind::NotFound => StoreError::NotFound(key.clone()),
        io::ErrorKind::PermissionDenied => StoreError::AccessDenied(key.clone()),
        _ => StoreError::Io {
            key: key.clone(),
            source: err,
        },
    }
}

/// 只识别字符串和 DWORD，其他类型返回 None
fn decode(key: &KeyPath, raw: &RegValue) -> Result<Option<StoreValue>, StoreError> {
    match raw.vtype {
        RegType::REG_SZ | RegType::REG_EXPAND_SZ => String::from_reg_value(raw)
            .map(|s| Some(StoreValue::String(s)))
            .map_err(|e| map_io(key, e)),
        RegType::REG_DWORD => u32::from_reg_value(raw)
            .map(|v| Some(StoreValue::Dword(v)))
            .map_err(|e| map_io(key, e)),
        _ => Ok(None),
    }
}

impl ConfigStore for RegistryStore {
    fn open_path(&self, key: &KeyPath) -> Result<bool, StoreError> {
        match self.open(key) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn get_value(&self, key: &KeyPath, name: &str) -> Result<Option<StoreValue>, StoreError> {
        let reg_key = self.open(key)?;
        match reg_key.get_raw_value(name) {
            Ok(raw) => decode(key, &raw),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(map_io(key, e)),
        }
    }

    fn set_value(&self, key: &KeyPath, name: &str, value: StoreValue) -> Result<(), StoreError> {
        let reg_key = self.create(key)?;
        let result = match value {
            StoreValue::String(s) => reg_key.set_value(name, &s),
            StoreValue::Dword(v) => reg_key.set_value(name, &v),
        };
        result.map_err(|e| map_io(key, e))
    }

    fn enumerate_subkeys(&self, key: &KeyPath) -> Result<Vec<String>, StoreError> {
        let reg_key = self.open(key)?;
        reg_key
            .enum_keys()
            .map(|k| k.map_err(|e| map_io(key, e)))
            .collect()
    }

    fn enumerate_values(&self, key: &KeyPath) -> Result<Vec<(String, StoreValue)>, StoreError> {
        let reg_key = self.open(key)?;
        let mut values = Vec::new();
        for entry in reg_key.enum_values() {
            let (name, raw) = entry.map_err(|e| map_io(key, e))?;
            if let Some(value) = decode(key, &raw)? {
                values.push((name, value));
            }
        }
        Ok(values)
    }

    fn create_path(&self, key: &KeyPath) -> Result<(), StoreError> {
        self.create(key).map(|_| ())
    }
}
