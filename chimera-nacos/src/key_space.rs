use indexmap::IndexMap;

/// 展平后的配置键空间
///
/// 单层 `String -> String` 映射，用 `.` 表示对象嵌套、`[i]` 表示列表下标。
/// 插入顺序即源文档的遍历顺序；重复插入同一个键会覆盖值但保留原位置。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlattenedKeySpace {
    entries: IndexMap<String, String>,
}

impl FlattenedKeySpace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: IndexMap::with_capacity(capacity),
        }
    }

    /// 插入键值，返回被覆盖的旧值
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// 删除键并保持其余键的顺序
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.shift_remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// 收集 `key[0]`、`key[1]`... 形式的连续下标值
    ///
    /// 从 0 开始，遇到第一个缺失的下标即停止
    pub fn indexed_values(&self, key: &str) -> Vec<&str> {
        let mut values = Vec::new();
        loop {
            let indexed_key = format!("{}[{}]", key, values.len());
            match self.get(&indexed_key) {
                Some(value) => values.push(value),
                None => break,
            }
        }
        values
    }

    /// 取出某个前缀下的子键空间，返回的键去掉了 `prefix.`
    ///
    /// # Example
    /// ```
    /// use chimera_nacos::FlattenedKeySpace;
    ///
    /// let space: FlattenedKeySpace = [("db.url", "x"), ("db.pool.size", "4"), ("app", "y")]
    ///     .into_iter()
    ///     .collect();
    /// let db = space.sub_space("db");
    /// assert_eq!(db.get("url"), Some("x"));
    /// assert_eq!(db.get("pool.size"), Some("4"));
    /// assert_eq!(db.len(), 2);
    /// ```
    pub fn sub_space(&self, prefix: &str) -> FlattenedKeySpace {
        if prefix.is_empty() {
            return self.clone();
        }
        let dotted = format!("{}.", prefix);
        self.entries
            .iter()
            .filter_map(|(k, v)| k.strip_prefix(&dotted).map(|rest| (rest.to_string(), v.clone())))
            .collect()
    }

    /// 后者覆盖前者的合并
    pub fn merge(&mut self, other: FlattenedKeySpace) {
        self.entries.extend(other.entries);
    }

    pub fn into_inner(self) -> IndexMap<String, String> {
        self.entries
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FlattenedKeySpace {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for FlattenedKeySpace {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        self.entries
            .extend(iter.into_iter().map(|(k, v)| (k.into(), v.into())));
    }
}

impl From<IndexMap<String, String>> for FlattenedKeySpace {
    fn from(entries: IndexMap<String, String>) -> Self {
        Self { entries }
    }
}

impl IntoIterator for FlattenedKeySpace {
    type Item = (String, String);
    type IntoIter = indexmap::map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
