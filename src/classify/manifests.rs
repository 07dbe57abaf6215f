//! Dependency-name extraction from package manifests.
//!
//! Each parser is lenient: malformed manifests yield `None` and the collector
//! falls back to regex content rules for that file.

use regex::Regex;
use roxmltree::Document;
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// Manifest formats whose declared dependencies are extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Requirements,
    Pyproject,
    Pipfile,
    PackageJson,
    ComposerJson,
    Pom,
    Gradle,
    GoMod,
    Cargo,
    Gemfile,
}

impl ManifestFormat {
    pub fn from_file_name(name: &str) -> Option<Self> {
        match name {
            "pyproject.toml" => Some(Self::Pyproject),
            "Pipfile" => Some(Self::Pipfile),
            "package.json" => Some(Self::PackageJson),
            "composer.json" => Some(Self::ComposerJson),
            "pom.xml" => Some(Self::Pom),
            "build.gradle" | "build.gradle.kts" => Some(Self::Gradle),
            "go.mod" => Some(Self::GoMod),
            "Cargo.toml" => Some(Self::Cargo),
            "Gemfile" => Some(Self::Gemfile),
            n if n.starts_with("requirements") && n.ends_with(".txt") => Some(Self::Requirements),
            _ => None,
        }
    }
}

/// Returns the lowercase dependency names declared in a manifest.
pub fn dependency_names(format: ManifestFormat, content: &str) -> Option<BTreeSet<String>> {
    let names = match format {
        ManifestFormat::Requirements => Some(parse_requirements(content)),
        ManifestFormat::Pyproject => parse_pyproject(content),
        ManifestFormat::Pipfile => parse_toml_tables(content, &[&["packages"], &["dev-packages"]]),
        ManifestFormat::PackageJson => parse_json_objects(
            content,
            &["dependencies", "devDependencies", "peerDependencies"],
        ),
        ManifestFormat::ComposerJson => parse_json_objects(content, &["require", "require-dev"]),
        ManifestFormat::Pom => parse_pom(content),
        ManifestFormat::Gradle => Some(parse_gradle(content)),
        ManifestFormat::GoMod => Some(parse_go_mod(content)),
        ManifestFormat::Cargo => parse_toml_tables(
            content,
            &[
                &["dependencies"],
                &["dev-dependencies"],
                &["workspace", "dependencies"],
            ],
        ),
        ManifestFormat::Gemfile => Some(parse_gemfile(content)),
    }?;

    Some(names.into_iter().map(|n| n.to_lowercase()).collect())
}

fn requirement_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*([A-Za-z0-9][A-Za-z0-9_.\-]*)").expect("valid regex"))
}

fn parse_requirements(content: &str) -> BTreeSet<String> {
    content
        .lines()
        .map(|line| line.split('#').next().unwrap_or_default())
        .filter(|line| !line.trim_start().starts_with('-'))
        .filter_map(|line| requirement_name_re().captures(line))
        .map(|caps| caps[1].to_string())
        .collect()
}

fn parse_pyproject(content: &str) -> Option<BTreeSet<String>> {
    let value: toml::Value = toml::from_str(content).ok()?;
    let mut names = BTreeSet::new();

    if let Some(deps) = value
        .get("project")
        .and_then(|p| p.get("dependencies"))
        .and_then(|d| d.as_array())
    {
        for spec in deps.iter().filter_map(|d| d.as_str()) {
            if let Some(caps) = requirement_name_re().captures(spec) {
                names.insert(caps[1].to_string());
            }
        }
    }

    if let Some(poetry) = value.get("tool").and_then(|t| t.get("poetry")) {
        for section in ["dependencies", "dev-dependencies"] {
            if let Some(table) = poetry.get(section).and_then(|d| d.as_table()) {
                names.extend(table.keys().filter(|k| *k != "python").cloned());
            }
        }
        if let Some(groups) = poetry.get("group").and_then(|g| g.as_table()) {
            for group in groups.values() {
                if let Some(table) = group.get("dependencies").and_then(|d| d.as_table()) {
                    names.extend(table.keys().cloned());
                }
            }
        }
    }

    Some(names)
}

fn parse_toml_tables(content: &str, paths: &[&[&str]]) -> Option<BTreeSet<String>> {
    let value: toml::Value = toml::from_str(content).ok()?;
    let mut names = BTreeSet::new();

    for path in paths {
        let mut cursor = Some(&value);
        for segment in *path {
            cursor = cursor.and_then(|v| v.get(*segment));
        }
        if let Some(table) = cursor.and_then(|v| v.as_table()) {
            names.extend(table.keys().cloned());
        }
    }

    Some(names)
}

fn parse_json_objects(content: &str, sections: &[&str]) -> Option<BTreeSet<String>> {
    let value: serde_json::Value = serde_json::from_str(content).ok()?;
    let mut names = BTreeSet::new();

    for section in sections {
        if let Some(object) = value.get(*section).and_then(|s| s.as_object()) {
            names.extend(object.keys().cloned());
        }
    }

    Some(names)
}

fn parse_pom(content: &str) -> Option<BTreeSet<String>> {
    let doc = Document::parse(content).ok()?;

    let names = doc
        .descendants()
        .filter(|n| n.has_tag_name("dependency") || n.has_tag_name("parent"))
        .filter_map(|n| {
            n.children()
                .find(|c| c.has_tag_name("artifactId"))
                .and_then(|c| c.text())
                .map(|t| t.trim().to_string())
        })
        .collect();

    Some(names)
}

fn parse_gradle(content: &str) -> BTreeSet<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r#"["']([\w.\-]+):([\w.\-]+)(?::[^"']*)?["']"#).expect("valid regex")
    });

    re.captures_iter(content)
        .map(|caps| caps[2].to_string())
        .collect()
}

fn parse_go_mod(content: &str) -> BTreeSet<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*(?:require\s+)?([A-Za-z0-9.\-]+\.[A-Za-z]+/[A-Za-z0-9_./\-]+)\s+v")
            .expect("valid regex")
    });

    re.captures_iter(content)
        .map(|caps| caps[1].to_string())
        .collect()
}

fn parse_gemfile(content: &str) -> BTreeSet<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r#"(?m)^\s*gem\s+["']([\w.\-]+)["']"#).expect("valid regex"));

    re.captures_iter(content)
        .map(|caps| caps[1].to_string())
        .collect()
}
