//! 犬種ラベル集合の導出
//!
//! 学習サンプルごとの生ラベル配列（重複あり）から、出力クラスインデックスに
//! 対応する一意なラベル集合を導出します。重複を除去して辞書順にソートした
//! 結果の位置が、そのままモデルの出力クラスインデックスになります。

/// 一意な犬種ラベルの順序付き集合
///
/// インデックス位置 = モデルの出力クラスインデックス
#[derive(Debug, Clone, PartialEq)]
pub struct LabelSet {
    labels: Vec<String>,
}

impl LabelSet {
    /// 生ラベル配列から一意なラベル集合を導出
    ///
    /// 重複を除去し、辞書順にソートします。
    pub fn from_raw(raw: &[String]) -> Self {
        let mut labels: Vec<String> = raw.to_vec();
        labels.sort();
        labels.dedup();
        Self { labels }
    }

    /// クラスインデックスからラベルを取得
    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    /// ラベルからクラスインデックスを取得
    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    /// ラベルが集合に含まれるか
    pub fn contains(&self, label: &str) -> bool {
        self.index_of(label).is_some()
    }

    /// クラス数を取得
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// ラベル一覧への参照を取得
    pub fn as_slice(&self) -> &[String] {
        &self.labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(labels: &[&str]) -> Vec<String> {
        labels.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_from_raw_dedup_and_sort() {
        let set = LabelSet::from_raw(&raw(&["beagle", "akita", "beagle", "corgi", "akita"]));
        assert_eq!(set.as_slice(), &raw(&["akita", "beagle", "corgi"]));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_index_mapping() {
        let set = LabelSet::from_raw(&raw(&["corgi", "akita", "beagle"]));
        assert_eq!(set.get(0), Some("akita"));
        assert_eq!(set.get(2), Some("corgi"));
        assert_eq!(set.get(3), None);
        assert_eq!(set.index_of("beagle"), Some(1));
        assert_eq!(set.index_of("husky"), None);
    }

    #[test]
    fn test_contains() {
        let set = LabelSet::from_raw(&raw(&["akita", "beagle"]));
        assert!(set.contains("akita"));
        assert!(!set.contains("corgi"));
    }

    #[test]
    fn test_empty() {
        let set = LabelSet::from_raw(&[]);
        assert!(set.is_empty());
        assert_eq!(set.get(0), None);
    }
}
