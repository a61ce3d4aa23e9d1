// src/config/taxonomy.rs
//! Keyword taxonomy: ordered categories plus global filter terms.
//!
//! Two on-disk formats are accepted.
//!
//! TOML:
//! ```toml
//! global_filters = ["广告"]
//!
//! [[categories]]
//! name = "AI"
//! priority = 10
//! required = ["AI", "人工智能"]   # any-of
//! mandatory = ["发布"]            # all-of (optional)
//! excluded = ["爆料"]
//! max_items = 5
//! ```
//!
//! Word list (`frequency_words.txt`):
//! ```text
//! [GLOBAL_FILTER]
//! 广告
//!
//! [WORD_GROUPS]
//! AI
//! 人工智能
//! +发布
//! !爆料
//! @5
//! ```
//! Groups are separated by blank lines; earlier groups get higher priority.

use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::error::{RadarError, Result};

/// One named keyword group. Read-only once the taxonomy is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordCategory {
    pub name: String,
    /// Higher = more important.
    pub priority: u32,
    /// At least one must occur in the title. Order is significant for ties.
    pub required_terms: Vec<String>,
    /// All must occur in the title, in addition to a required term.
    pub mandatory_terms: Vec<String>,
    /// Any occurrence vetoes the match.
    pub excluded_terms: Vec<String>,
    /// Display cap applied after ranking.
    pub max_items: Option<usize>,
    /// Declaration index in the taxonomy.
    pub order: usize,
}

/// Terms that drop an item from every category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalFilters {
    pub terms: Vec<String>,
}

/// Validated, immutable taxonomy. Build once per run and share by reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Taxonomy {
    categories: Vec<KeywordCategory>,
    global_filters: GlobalFilters,
}

/// Builder input for one category before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategorySpec {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub mandatory: Vec<String>,
    #[serde(default)]
    pub excluded: Vec<String>,
    #[serde(default)]
    pub max_items: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TaxonomyFile {
    #[serde(default)]
    global_filters: Vec<String>,
    #[serde(default)]
    categories: Vec<CategorySpec>,
}

impl Taxonomy {
    /// Validate specs and build the taxonomy.
    ///
    /// A category without a priority gets `len - index`, so declaration order
    /// doubles as importance.
    pub fn new(specs: Vec<CategorySpec>, global_filters: Vec<String>) -> Result<Self> {
        let n = specs.len();
        let mut names = HashSet::new();
        let mut categories = Vec::with_capacity(n);

        for (order, spec) in specs.into_iter().enumerate() {
            let required = clean_terms(spec.required, "required", order)?;
            if required.is_empty() {
                return Err(RadarError::config(format!(
                    "category #{} has no required terms",
                    order + 1
                )));
            }
            let mandatory = clean_terms(spec.mandatory, "mandatory", order)?;
            let excluded = clean_terms(spec.excluded, "excluded", order)?;

            let name = spec
                .name
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| required.join(" "));
            if !names.insert(name.clone()) {
                return Err(RadarError::config(format!("duplicate category name `{name}`")));
            }

            let priority = match spec.priority {
                Some(p) if p < 0 => {
                    return Err(RadarError::config(format!(
                        "category `{name}` has negative priority {p}"
                    )))
                }
                Some(p) => u32::try_from(p).map_err(|_| {
                    RadarError::config(format!("category `{name}` priority {p} out of range"))
                })?,
                None => (n - order) as u32,
            };

            let max_items = match spec.max_items {
                Some(m) if m <= 0 => {
                    return Err(RadarError::config(format!(
                        "category `{name}` has non-positive max_items {m}"
                    )))
                }
                Some(m) => Some(m as usize),
                None => None,
            };

            categories.push(KeywordCategory {
                name,
                priority,
                required_terms: required,
                mandatory_terms: mandatory,
                excluded_terms: excluded,
                max_items,
                order,
            });
        }

        let global = clean_terms(global_filters, "global filter", usize::MAX)?;

        Ok(Self {
            categories,
            global_filters: GlobalFilters { terms: global },
        })
    }

    pub fn categories(&self) -> &[KeywordCategory] {
        &self.categories
    }

    pub fn global_filters(&self) -> &GlobalFilters {
        &self.global_filters
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn category(&self, name: &str) -> Option<&KeywordCategory> {
        self.categories.iter().find(|c| c.name == name)
    }

    /// Load by extension: `.toml` → TOML, anything else → word list.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            RadarError::config(format!("reading taxonomy {}: {e}", path.display()))
        })?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let tax = if ext == "toml" {
            Self::from_toml_str(&content)?
        } else {
            Self::from_word_list(&content)?
        };
        tracing::info!(
            categories = tax.categories.len(),
            global_filters = tax.global_filters.terms.len(),
            path = %path.display(),
            "taxonomy loaded"
        );
        Ok(tax)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let f: TaxonomyFile = toml::from_str(s)?;
        Self::new(f.categories, f.global_filters)
    }

    pub fn from_word_list(s: &str) -> Result<Self> {
        #[derive(PartialEq)]
        enum Section {
            Groups,
            Global,
        }

        let mut section = Section::Groups;
        let mut specs = Vec::new();
        let mut global = Vec::new();
        let mut current: Option<CategorySpec> = None;

        for (lineno, raw) in s.lines().enumerate() {
            let line = raw.trim();
            if line.starts_with('#') {
                continue;
            }
            if line.is_empty() {
                if let Some(spec) = current.take() {
                    specs.push(spec);
                }
                continue;
            }
            match line.to_ascii_uppercase().as_str() {
                "[GLOBAL_FILTER]" => {
                    if let Some(spec) = current.take() {
                        specs.push(spec);
                    }
                    section = Section::Global;
                    continue;
                }
                "[WORD_GROUPS]" => {
                    section = Section::Groups;
                    continue;
                }
                _ => {}
            }

            if section == Section::Global {
                global.push(line.to_string());
                continue;
            }

            let spec = current.get_or_insert_with(CategorySpec::default);
            if let Some(rest) = line.strip_prefix('+') {
                spec.mandatory.push(rest.to_string());
            } else if let Some(rest) = line.strip_prefix('!') {
                spec.excluded.push(rest.to_string());
            } else if let Some(rest) = line.strip_prefix('@') {
                let n: i64 = rest.trim().parse().map_err(|_| {
                    RadarError::config(format!("line {}: invalid limit `{line}`", lineno + 1))
                })?;
                spec.max_items = Some(n);
            } else {
                spec.required.push(line.to_string());
            }
        }
        if let Some(spec) = current.take() {
            specs.push(spec);
        }

        Self::new(specs, global)
    }
}

fn clean_terms(terms: Vec<String>, kind: &str, order: usize) -> Result<Vec<String>> {
    let mut out: Vec<String> = Vec::with_capacity(terms.len());
    for t in terms {
        let t = t.trim();
        if t.is_empty() {
            let at = if order == usize::MAX {
                "global filters".to_string()
            } else {
                format!("category #{}", order + 1)
            };
            return Err(RadarError::config(format!("empty {kind} term in {at}")));
        }
        if !out.iter().any(|o| o == t) {
            out.push(t.to_string());
        }
    }
    Ok(out)
}
