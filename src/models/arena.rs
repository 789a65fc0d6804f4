use std::collections::HashMap;
use std::hash::Hash;

/// 安定したトラッキングIDをキーとするアリーナ
///
/// 要素は連続した `Vec` に格納し、キーからスロット位置への索引を別に持ちます。
/// 更新はインデックス参照によるその場更新、クリアはアリーナ全体のリセットです。
#[derive(Debug)]
pub struct Arena<K, V> {
    slots: Vec<V>,
    index: HashMap<K, usize>,
}

impl<K, V> Default for Arena<K, V> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<K: Copy + Eq + Hash, V> Arena<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// 新規キーとして値を追加。既存キーの場合は値を置き換える
    pub fn insert(&mut self, key: K, value: V) -> usize {
        if let Some(&slot) = self.index.get(&key) {
            self.slots[slot] = value;
            return slot;
        }
        let slot = self.slots.len();
        self.slots.push(value);
        self.index.insert(key, slot);
        slot
    }

    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.index.get(key).map(|&slot| &self.slots[slot])
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        match self.index.get(key) {
            Some(&slot) => self.slots.get_mut(slot),
            None => None,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// 全要素を破棄する
    pub fn reset(&mut self) {
        self.slots.clear();
        self.index.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_update_in_place() {
        let mut arena: Arena<u64, &str> = Arena::new();
        let a = arena.insert(7, "first");
        let b = arena.insert(3, "second");
        assert_ne!(a, b);

        if let Some(value) = arena.get_mut(&7) {
            *value = "updated";
        }
        assert_eq!(arena.get(&7), Some(&"updated"));
        assert_eq!(arena.insert(3, "replaced"), b);
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn test_reset_drops_everything() {
        let mut arena: Arena<u64, u32> = Arena::new();
        arena.insert(1, 10);
        arena.insert(2, 20);
        arena.reset();
        assert!(arena.is_empty());
        assert!(!arena.contains(&1));
        assert!(arena.get(&2).is_none());
    }
}
