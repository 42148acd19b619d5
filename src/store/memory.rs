//! 内存配置存储
//!
//! 按注册表语义保存键和值：写入时逐级创建父键，枚举只返回直接子键。
//! 键名比较区分大小写。

use super::{ConfigStore, KeyPath, StoreError, StoreValue};
use parking_lot::RwLock;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct MemoryStore {
    keys: RwLock<BTreeMap<KeyPath, BTreeMap<String, StoreValue>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置一个值，便于测试构造宿主安装状态
    pub fn with_value(self, key: &KeyPath, name: &str, value: impl Into<StoreValue>) -> Self {
        self.insert(key, name, value.into());
        self
    }

    /// 预置一个空键
    pub fn with_key(self, key: &KeyPath) -> Self {
        ensure_key(&mut self.keys.write(), key);
        self
    }

    /// 导出某个键下的所有值
    pub fn values_of(&self, key: &KeyPath) -> BTreeMap<String, StoreValue> {
        self.keys.read().get(key).cloned().unwrap_or_default()
    }

    fn insert(&self, key: &KeyPath, name: &str, value: StoreValue) {
        let mut keys = self.keys.write();
        ensure_key(&mut keys, key);
        if let Some(values) = keys.get_mut(key) {
            values.insert(name.to_string(), value);
        }
    }
}

fn ensure_key(keys: &mut BTreeMap<KeyPath, BTreeMap<String, StoreValue>>, key: &KeyPath) {
    let mut current = Some(key.clone());
    while let Some(k) = current {
        current = k.parent();
        keys.entry(k).or_default();
    }
}

impl ConfigStore for MemoryStore {
    fn open_path(&self, key: &KeyPath) -> Result<bool, StoreError> {
        Ok(self.keys.read().contains_key(key))
    }

    fn get_value(&self, key: &KeyPath, name: &str) -> Result<Option<StoreValue>, StoreError> {
        let keys = self.keys.read();
        let values = keys
            .get(key)
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;
        Ok(values.get(name).cloned())
    }

    fn set_value(&self, key: &KeyPath, name: &str, value: StoreValue) -> Result<(), StoreError> {
        self.insert(key, name, value);
        Ok(())
    }

    fn enumerate_subkeys(&self, key: &KeyPath) -> Result<Vec<String>, StoreError> {
        let keys = self.keys.read();
        if !keys.contains_key(key) {
            return Err(StoreError::NotFound(key.clone()));
        }
        let children = keys
            .keys()
            .filter(|k| k.parent().as_ref() == Some(key))
            .map(|k| k.leaf().to_string())
            .collect();
        Ok(children)
    }

    fn enumerate_values(&self, key: &KeyPath) -> Result<Vec<(String, StoreValue)>, StoreError> {
        let keys = self.keys.read();
        let values = keys
            .get(key)
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;
        Ok(values
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect())
    }

    fn create_path(&self, key: &KeyPath) -> Result<(), StoreError> {
        ensure_key(&mut self.keys.write(), key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_value_creates_ancestors() {
        let store = MemoryStore::new();
        let key = KeyPath::current_user(r"Software\Vendor\Product\Sub");
        store.set_value(&key, "Name", "x".into()).unwrap();

        assert!(store.open_path(&KeyPath::current_user(r"Software\Vendor")).unwrap());
        assert_eq!(
            store.enumerate_subkeys(&KeyPath::current_user(r"Software\Vendor")).unwrap(),
            vec!["Product".to_string()]
        );
        assert_eq!(
            store.get_value(&key, "Name").unwrap(),
            Some(StoreValue::String("x".to_string()))
        );
    }

    #[test]
    fn test_enumerate_only_direct_children() {
        let base = KeyPath::local_machine(r"SOFTWARE\McNeel\Rhinoceros");
        let store = MemoryStore::new()
            .with_key(&base.join(r"7.0\Plug-ins"))
            .with_key(&base.join("8.0"));

        let mut children = store.enumerate_subkeys(&base).unwrap();
        children.sort();
        assert_eq!(children, vec!["7.0".to_string(), "8.0".to_string()]);
    }

    #[test]
    fn test_missing_key_is_not_found() {
        let store = MemoryStore::new();
        let key = KeyPath::local_machine(r"SOFTWARE\Nope");
        assert!(!store.open_path(&key).unwrap());
        assert!(store.enumerate_subkeys(&key).unwrap_err().is_not_found());
        assert!(store.subkeys_or_empty(&key).unwrap().is_empty());
        assert_eq!(store.get_string(&key, "x").unwrap(), None);
    }

    #[test]
    fn test_hives_are_separate() {
        let store = MemoryStore::new().with_key(&KeyPath::local_machine(r"SOFTWARE\A"));
        assert!(!store.open_path(&KeyPath::current_user(r"SOFTWARE\A")).unwrap());
    }
}
