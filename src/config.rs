use anyhow::{Context, Result, bail};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// API credentials for the Swrve dashboard.
///
/// Immutable once constructed; every accessor takes its own copy, so there
/// is no shared configuration state between accessors.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub api_key: String,
    pub personal_key: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, personal_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            personal_key: personal_key.into(),
        }
    }

    /// Resolves credentials using (in order of precedence):
    /// - explicit `api_key`/`personal_key` arguments
    /// - environment variables `SWRVE_API_KEY` / `SWRVE_PERSONAL_KEY`
    /// - the `[section]` of a config file (`conf_path`, `SWRVE_RC`, or `~/.swrve`)
    pub fn resolve(
        api_key: Option<String>,
        personal_key: Option<String>,
        section: Option<&str>,
        conf_path: Option<&Path>,
    ) -> Result<Self> {
        let mut api_key = api_key.or_else(|| std::env::var("SWRVE_API_KEY").ok());
        let mut personal_key =
            personal_key.or_else(|| std::env::var("SWRVE_PERSONAL_KEY").ok());

        let section = section.unwrap_or("defaults");
        let candidates = conf_candidates(conf_path);

        if api_key.is_none() || personal_key.is_none() {
            for path in &candidates {
                if !path.exists() {
                    continue;
                }
                let sections = read_conf(path).with_context(|| {
                    format!("failed to read configuration file {}", path.display())
                })?;
                if let Some(values) = sections.get(section) {
                    if api_key.is_none() {
                        api_key = values.get("api_key").cloned();
                    }
                    if personal_key.is_none() {
                        personal_key = values.get("personal_key").cloned();
                    }
                }
                break;
            }
        }

        let candidates_text = candidates
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");

        let Some(api_key) = api_key else {
            bail!(
                "Missing configuration: api_key (set SWRVE_API_KEY or put `api_key =` under [{}] in one of: {})",
                section,
                candidates_text
            );
        };
        let Some(personal_key) = personal_key else {
            bail!(
                "Missing configuration: personal_key (set SWRVE_PERSONAL_KEY or put `personal_key =` under [{}] in one of: {})",
                section,
                candidates_text
            );
        };

        Ok(Self {
            api_key,
            personal_key,
        })
    }

    /// Writes the keys back to `[section]` of the config file, creating the
    /// file when it does not exist and preserving other sections.
    pub fn save(&self, section: &str, conf_path: Option<&Path>) -> Result<()> {
        let path = conf_candidates(conf_path)
            .into_iter()
            .next()
            .context("no configuration path available (no home directory?)")?;

        let mut sections = if path.exists() {
            read_conf(&path)
                .with_context(|| format!("failed to read configuration file {}", path.display()))?
        } else {
            BTreeMap::new()
        };

        let values = sections.entry(section.to_string()).or_default();
        values.insert("api_key".to_string(), self.api_key.clone());
        values.insert("personal_key".to_string(), self.personal_key.clone());

        let mut out = String::new();
        for (name, values) in &sections {
            out.push_str(&format!("[{}]\n", name));
            for (k, v) in values {
                out.push_str(&format!("{} = {}\n", k, v));
            }
            out.push('\n');
        }

        std::fs::write(&path, out)
            .with_context(|| format!("failed to write configuration file {}", path.display()))?;
        Ok(())
    }

    pub(crate) fn to_params(&self) -> Vec<(String, String)> {
        vec![
            ("api_key".to_string(), self.api_key.clone()),
            ("personal_key".to_string(), self.personal_key.clone()),
        ]
    }
}

type Sections = BTreeMap<String, BTreeMap<String, String>>;

fn read_conf(path: &Path) -> Result<Sections> {
    let text = std::fs::read_to_string(path)?;
    Ok(parse_conf(&text))
}

/// Minimal INI-style parser: `[section]` headers, `key = value` pairs
/// (`:` also accepted), `#`/`;` comments.
fn parse_conf(text: &str) -> Sections {
    let mut sections = Sections::new();
    let mut current: Option<String> = None;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if line.starts_with('[') && line.ends_with(']') {
            current = Some(line[1..line.len() - 1].trim().to_string());
            continue;
        }

        let Some(section) = &current else { continue };
        let split = line
            .split_once('=')
            .or_else(|| line.split_once(':'));
        if let Some((k, v)) = split {
            let k = k.trim();
            let v = strip_quotes(v.trim());
            if !k.is_empty() && !v.is_empty() {
                sections
                    .entry(section.clone())
                    .or_default()
                    .insert(k.to_string(), v.to_string());
            }
        }
    }

    sections
}

fn strip_quotes(s: &str) -> &str {
    let s = s.trim();
    if (s.starts_with('"') && s.ends_with('"') && s.len() >= 2)
        || (s.starts_with('\'') && s.ends_with('\'') && s.len() >= 2)
    {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

fn conf_candidates(explicit: Option<&Path>) -> Vec<PathBuf> {
    if let Some(p) = explicit {
        return vec![p.to_path_buf()];
    }
    if let Ok(p) = std::env::var("SWRVE_RC") {
        return vec![PathBuf::from(p)];
    }
    let mut v = Vec::new();
    if let Some(home) = dirs::home_dir() {
        v.push(home.join(".swrve"));
    }
    v
}
