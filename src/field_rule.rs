use std::collections::HashSet;

use crate::error::{Error, Result};

/// 生の値のカーディナリティ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Single,
    Multi,
    Cascade,
}

/// 生の値がスカラーか、キー抽出が必要なオブジェクトか
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Plain,
    Json,
}

impl Shape {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "single" => Some(Shape::Single),
            "multi" => Some(Shape::Multi),
            "cascade" => Some(Shape::Cascade),
            _ => None,
        }
    }
}

impl Encoding {
    fn parse(value: &str) -> Option<Self> {
        match value {
            // plainarray は旧形式の設定ファイルとの互換用
            "plain" | "plainarray" => Some(Encoding::Plain),
            "json" => Some(Encoding::Json),
            _ => None,
        }
    }
}

/// フィールド値の平坦化方法
///
/// shape と encoding の組み合わせを閉じた列挙型で表す。
/// キー抽出が必要なバリアントは必ず空でないキーを持つ。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    SinglePlain,
    SingleJson { key: String },
    MultiPlain,
    MultiJson { key: String },
    /// 親子の選択リスト。encoding は無視される
    Cascade { key: String },
}

impl Projection {
    pub fn shape(&self) -> Shape {
        match self {
            Projection::SinglePlain | Projection::SingleJson { .. } => Shape::Single,
            Projection::MultiPlain | Projection::MultiJson { .. } => Shape::Multi,
            Projection::Cascade { .. } => Shape::Cascade,
        }
    }

    pub fn encoding(&self) -> Encoding {
        match self {
            Projection::SinglePlain | Projection::MultiPlain => Encoding::Plain,
            _ => Encoding::Json,
        }
    }

    pub fn access_key(&self) -> Option<&str> {
        match self {
            Projection::SingleJson { key }
            | Projection::MultiJson { key }
            | Projection::Cascade { key } => Some(key),
            _ => None,
        }
    }
}

/// エクスポート対象フィールド1件分のルール
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRule {
    /// JIRAに要求するフィールドID（例: customfield_10001）
    pub internal_name: String,
    /// 列見出し
    pub display_name: String,
    pub projection: Projection,
}

impl FieldRule {
    pub fn new(
        internal_name: impl Into<String>,
        display_name: impl Into<String>,
        projection: Projection,
    ) -> Self {
        Self {
            internal_name: internal_name.into(),
            display_name: display_name.into(),
            projection,
        }
    }

    /// `表示名, shape, encoding, アクセスキー` 形式の定義を解析する
    pub fn parse(internal_name: &str, definition: &str) -> Result<Self> {
        let internal_name = internal_name.trim();
        if internal_name.is_empty() {
            return Err(Error::InvalidConfiguration(
                "field rule with empty internal name".to_string(),
            ));
        }

        let parts: Vec<&str> = definition.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(Error::InvalidConfiguration(format!(
                "field '{}': expected 4 comma-separated parts (display name, shape, encoding, access key), found {}",
                internal_name,
                parts.len()
            )));
        }

        let display_name = parts[0].to_string();
        let shape_text = parts[1].to_lowercase();
        let encoding_text = parts[2].to_lowercase();
        let access_key = parts[3].to_lowercase();

        let shape = Shape::parse(&shape_text).ok_or_else(|| {
            Error::InvalidConfiguration(format!(
                "field '{}': unknown shape '{}' (expected single, multi or cascade)",
                internal_name, shape_text
            ))
        })?;

        let encoding = match (shape, encoding_text.as_str()) {
            (Shape::Cascade, "") => None,
            _ => Some(Encoding::parse(&encoding_text).ok_or_else(|| {
                Error::InvalidConfiguration(format!(
                    "field '{}': unknown encoding '{}' (expected plain or json)",
                    internal_name, encoding_text
                ))
            })?),
        };

        let require_key = || -> Result<String> {
            if access_key.is_empty() {
                Err(Error::InvalidConfiguration(format!(
                    "field '{}': access key is required for {} fields",
                    internal_name,
                    if shape == Shape::Cascade { "cascade" } else { "json" }
                )))
            } else {
                Ok(access_key.clone())
            }
        };

        let projection = match (shape, encoding) {
            (Shape::Cascade, _) => Projection::Cascade { key: require_key()? },
            (Shape::Single, Some(Encoding::Plain)) => Projection::SinglePlain,
            (Shape::Single, _) => Projection::SingleJson { key: require_key()? },
            (Shape::Multi, Some(Encoding::Plain)) => Projection::MultiPlain,
            (Shape::Multi, _) => Projection::MultiJson { key: require_key()? },
        };

        Ok(Self::new(internal_name, display_name, projection))
    }
}

/// 宣言順を保持するフィールドルールの集合
///
/// 宣言順がそのまま出力列の順になる。構築後は変更しない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRuleSet {
    rules: Vec<FieldRule>,
}

impl FieldRuleSet {
    pub fn new(rules: Vec<FieldRule>) -> Result<Self> {
        if rules.is_empty() {
            return Err(Error::ConfigurationMissing(
                "no export fields are configured".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for rule in &rules {
            if !seen.insert(rule.internal_name.as_str()) {
                return Err(Error::InvalidConfiguration(format!(
                    "field '{}' is declared more than once",
                    rule.internal_name
                )));
            }
        }

        Ok(Self { rules })
    }

    /// `(内部名, 定義文字列)` の並びから構築する
    pub fn from_entries<'a, I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let rules = entries
            .into_iter()
            .map(|(name, definition)| FieldRule::parse(name, definition))
            .collect::<Result<Vec<_>>>()?;
        Self::new(rules)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FieldRule> {
        self.rules.iter()
    }

    pub fn get(&self, internal_name: &str) -> Option<&FieldRule> {
        self.rules.iter().find(|r| r.internal_name == internal_name)
    }

    /// 検索APIの fields パラメータに渡す値
    pub fn internal_names(&self) -> Vec<String> {
        self.rules.iter().map(|r| r.internal_name.clone()).collect()
    }

    pub fn display_names(&self) -> Vec<String> {
        self.rules.iter().map(|r| r.display_name.clone()).collect()
    }
}

impl<'a> IntoIterator for &'a FieldRuleSet {
    type Item = &'a FieldRule;
    type IntoIter = std::slice::Iter<'a, FieldRule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}
