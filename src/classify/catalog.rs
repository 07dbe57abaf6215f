//! Rule tables consulted by the signal collector.
//!
//! Every rule carries a fixed weight inside the band of its family (see
//! [`EvidenceKind::band`]). The catalog is immutable once built and shared
//! across classification runs.

use super::evidence::{Category, EvidenceKind};
use regex::Regex;

/// File-name matcher for marker rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilePattern {
    Name(&'static str),
    Suffix(&'static str),
}

impl FilePattern {
    pub fn matches(&self, file_name: &str) -> bool {
        match self {
            FilePattern::Name(name) => file_name == *name,
            FilePattern::Suffix(suffix) => file_name.ends_with(suffix),
        }
    }
}

/// Presence of a well-known file implies a candidate.
#[derive(Debug, Clone)]
pub struct MarkerRule {
    pub pattern: FilePattern,
    pub category: Category,
    pub subject: &'static str,
    pub weight: f64,
}

/// Which sampled files a content rule inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentScope {
    /// Any sampled file
    Any,
    /// docker-compose / compose files
    Compose,
    /// Source and configuration files, manifests excluded
    Source,
}

/// A regex hit inside a sampled file implies a candidate.
#[derive(Debug, Clone)]
pub struct ContentRule {
    pub scope: ContentScope,
    pub category: Category,
    pub subject: &'static str,
    pub pattern: Regex,
    pub weight: f64,
}

/// A declared dependency implies a candidate. A trailing `*` matches by prefix.
#[derive(Debug, Clone)]
pub struct DependencyRule {
    pub dependency: &'static str,
    pub category: Category,
    pub subject: &'static str,
    pub weight: f64,
}

impl DependencyRule {
    pub fn matches(&self, name: &str) -> bool {
        match self.dependency.strip_suffix('*') {
            Some(prefix) => name.starts_with(prefix),
            None => name == self.dependency,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapePattern {
    /// A directory at this relative path exists.
    Directory(&'static str),
    /// At least `min_files` files carry this extension.
    ExtensionCensus {
        extension: &'static str,
        min_files: usize,
    },
}

/// Project layout implies a candidate.
#[derive(Debug, Clone)]
pub struct ShapeRule {
    pub pattern: ShapePattern,
    pub category: Category,
    pub subject: &'static str,
    pub weight: f64,
}

/// The full rule set used by one collector.
#[derive(Debug, Clone, Default)]
pub struct SignalCatalog {
    pub markers: Vec<MarkerRule>,
    pub content: Vec<ContentRule>,
    pub dependencies: Vec<DependencyRule>,
    pub shapes: Vec<ShapeRule>,
}

const SOURCE_EXTENSIONS: &[&str] = &[
    "py", "js", "jsx", "mjs", "cjs", "ts", "tsx", "java", "kt", "go", "rs", "rb", "php", "cs",
    "ex", "exs", "scala", "yml", "yaml", "toml", "ini", "cfg", "conf", "properties", "env",
    "json", "xml",
];

const COMPOSE_FILES: &[&str] = &[
    "docker-compose.yml",
    "docker-compose.yaml",
    "compose.yml",
    "compose.yaml",
];

/// Directories never descended into.
pub const EXCLUDED_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "target",
    "vendor",
    "dist",
    "build",
    "__pycache__",
    ".venv",
    "venv",
    ".tox",
    ".mypy_cache",
    ".pytest_cache",
    ".idea",
    ".vscode",
    ".gradle",
    "bin",
    "obj",
];

pub fn is_compose_file(file_name: &str) -> bool {
    COMPOSE_FILES.contains(&file_name)
        || (file_name.starts_with("docker-compose.")
            && (file_name.ends_with(".yml") || file_name.ends_with(".yaml")))
}

pub fn is_source_extension(extension: &str) -> bool {
    SOURCE_EXTENSIONS.contains(&extension)
}

fn marker(pattern: FilePattern, category: Category, subject: &'static str, weight: f64) -> MarkerRule {
    MarkerRule {
        pattern,
        category,
        subject,
        weight,
    }
}

fn content(
    scope: ContentScope,
    category: Category,
    subject: &'static str,
    pattern: &str,
    weight: f64,
) -> ContentRule {
    ContentRule {
        scope,
        category,
        subject,
        pattern: Regex::new(pattern).expect("catalog regex must compile"),
        weight,
    }
}

fn dep(dependency: &'static str, category: Category, subject: &'static str, weight: f64) -> DependencyRule {
    DependencyRule {
        dependency,
        category,
        subject,
        weight,
    }
}

fn shape(pattern: ShapePattern, category: Category, subject: &'static str, weight: f64) -> ShapeRule {
    ShapeRule {
        pattern,
        category,
        subject,
        weight,
    }
}

impl SignalCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        Self {
            markers: default_markers(),
            content: default_content_rules(),
            dependencies: default_dependency_rules(),
            shapes: default_shape_rules(),
        }
    }

    pub fn markers_for<'a>(&'a self, file_name: &'a str) -> impl Iterator<Item = &'a MarkerRule> + 'a {
        self.markers
            .iter()
            .filter(move |rule| rule.pattern.matches(file_name))
    }

    pub fn dependency_rules_for<'a>(
        &'a self,
        dependency: &'a str,
    ) -> impl Iterator<Item = &'a DependencyRule> + 'a {
        self.dependencies
            .iter()
            .filter(move |rule| rule.matches(dependency))
    }

    /// Every (family, weight) pair in the catalog, for band checks.
    pub fn weights(&self) -> Vec<(EvidenceKind, &'static str, f64)> {
        let mut out = Vec::new();
        out.extend(self.markers.iter().map(|r| (EvidenceKind::Marker, r.subject, r.weight)));
        out.extend(self.content.iter().map(|r| (EvidenceKind::ContentMatch, r.subject, r.weight)));
        out.extend(
            self.dependencies
                .iter()
                .map(|r| (EvidenceKind::ContentMatch, r.subject, r.weight)),
        );
        out.extend(self.shapes.iter().map(|r| (EvidenceKind::DirectoryShape, r.subject, r.weight)));
        out
    }
}

fn default_markers() -> Vec<MarkerRule> {
    use Category::*;
    use FilePattern::{Name, Suffix};

    vec![
        marker(Name("requirements.txt"), Language, "python", 0.4),
        marker(Name("requirements.txt"), PackageManager, "pip", 0.45),
        marker(Name("setup.py"), Language, "python", 0.35),
        marker(Name("setup.py"), PackageManager, "pip", 0.3),
        marker(Name("pyproject.toml"), Language, "python", 0.45),
        marker(Name("Pipfile"), Language, "python", 0.4),
        marker(Name("Pipfile"), PackageManager, "pipenv", 0.5),
        marker(Name("poetry.lock"), PackageManager, "poetry", 0.5),
        marker(Name("manage.py"), Framework, "django", 0.4),
        marker(Name("package.json"), Language, "javascript", 0.4),
        marker(Name("package.json"), PackageManager, "npm", 0.3),
        marker(Name("package-lock.json"), PackageManager, "npm", 0.5),
        marker(Name("yarn.lock"), PackageManager, "yarn", 0.5),
        marker(Name("pnpm-lock.yaml"), PackageManager, "pnpm", 0.5),
        marker(Name("tsconfig.json"), Language, "typescript", 0.45),
        marker(Name("pom.xml"), Language, "java", 0.45),
        marker(Name("pom.xml"), BuildTool, "maven", 0.5),
        marker(Name("build.gradle"), Language, "java", 0.4),
        marker(Name("build.gradle"), BuildTool, "gradle", 0.5),
        marker(Name("build.gradle.kts"), Language, "kotlin", 0.4),
        marker(Name("build.gradle.kts"), BuildTool, "gradle", 0.5),
        marker(Name("go.mod"), Language, "go", 0.5),
        marker(Name("go.mod"), PackageManager, "go-modules", 0.45),
        marker(Name("Cargo.toml"), Language, "rust", 0.5),
        marker(Name("Cargo.toml"), BuildTool, "cargo", 0.5),
        marker(Name("composer.json"), Language, "php", 0.45),
        marker(Name("composer.json"), PackageManager, "composer", 0.5),
        marker(Name("Gemfile"), Language, "ruby", 0.45),
        marker(Name("Gemfile"), PackageManager, "bundler", 0.5),
        marker(Suffix(".csproj"), Language, "csharp", 0.45),
        marker(Suffix(".csproj"), BuildTool, "dotnet", 0.5),
        marker(Suffix(".sln"), Language, "csharp", 0.35),
        marker(Suffix(".sln"), BuildTool, "dotnet", 0.4),
        marker(Name("mix.exs"), Language, "elixir", 0.5),
        marker(Name("Makefile"), BuildTool, "make", 0.35),
        marker(Name("Dockerfile"), BuildTool, "docker", 0.4),
        marker(Name(".gitlab-ci.yml"), CiTool, "gitlab-ci", 0.5),
        marker(Name("Jenkinsfile"), CiTool, "jenkins", 0.5),
        marker(Name(".travis.yml"), CiTool, "travis-ci", 0.5),
        marker(Name("azure-pipelines.yml"), CiTool, "azure-pipelines", 0.5),
    ]
}

fn default_content_rules() -> Vec<ContentRule> {
    use Category::*;
    use ContentScope::*;

    vec![
        // Data stores: connection strings
        content(Any, DataStore, "postgresql", r"\bpostgres(?:ql)?(?:\+\w+)?://", 0.7),
        content(Any, DataStore, "mongodb", r"\bmongodb(?:\+srv)?://", 0.7),
        content(Any, DataStore, "mysql", r"\b(?:mysql|mariadb)(?:\+\w+)?://", 0.7),
        content(Any, DataStore, "clickhouse", r"\bclickhouse://", 0.7),
        content(Any, DataStore, "redis", r"\brediss?://", 0.65),
        // Data stores: container images
        content(Compose, DataStore, "postgresql", r#"(?m)^\s*image:\s*["']?(?:[\w.\-]+/)*(?:postgres|pgvector|postgis)\b"#, 0.65),
        content(Compose, DataStore, "mongodb", r#"(?m)^\s*image:\s*["']?(?:[\w.\-]+/)*mongo\b"#, 0.65),
        content(Compose, DataStore, "mysql", r#"(?m)^\s*image:\s*["']?(?:[\w.\-]+/)*(?:mysql|mariadb)\b"#, 0.65),
        content(Compose, DataStore, "clickhouse", r#"(?m)^\s*image:\s*["']?(?:[\w.\-]+/)*clickhouse-server\b"#, 0.65),
        content(Compose, DataStore, "redis", r#"(?m)^\s*image:\s*["']?(?:[\w.\-]+/)*(?:redis|redis-stack)\b"#, 0.6),
        content(Compose, DataStore, "elasticsearch", r#"(?m)^\s*image:\s*["']?(?:[\w.\-]+/)*elasticsearch\b"#, 0.65),
        // Data stores: driver usage in source
        content(Source, DataStore, "postgresql", r"\b(?:psycopg2?|asyncpg|pgvector|tokio_postgres)\b", 0.6),
        content(Source, DataStore, "mongodb", r"\b(?:pymongo|mongoose|MongoClient)\b", 0.6),
        content(Source, DataStore, "mysql", r"\b(?:pymysql|MySQLdb|mysql2)\b", 0.6),
        content(Source, DataStore, "redis", r"\b(?:ioredis|import redis|redis\.Redis|Jedis)\b", 0.6),
        content(Source, DataStore, "elasticsearch", r"(?i)\belasticsearch\b", 0.6),
        content(Source, DataStore, "clickhouse", r"\bclickhouse[_\-](?:driver|connect)\b", 0.6),
        content(Source, DataStore, "dynamodb", r"(?i)\bdynamodb\b", 0.6),
        // Frameworks
        content(Source, Framework, "django", r"\b(?:from|import) django\b", 0.7),
        content(Source, Framework, "flask", r"\bfrom flask import\b", 0.7),
        content(Source, Framework, "fastapi", r"\bfrom fastapi import\b", 0.7),
        content(Source, Framework, "express", r#"(?:require\(\s*["']express["']\s*\)|from\s+["']express["'])"#, 0.7),
        content(Source, Framework, "react", r#"from\s+["']react["']"#, 0.65),
        content(Source, Framework, "vue", r#"from\s+["']vue["']"#, 0.65),
        content(Source, Framework, "angular", r#"["']@angular/core["']"#, 0.65),
        content(Source, Framework, "nestjs", r#"["']@nestjs/common["']"#, 0.65),
        content(Source, Framework, "spring", r"@SpringBootApplication\b", 0.75),
        content(Source, Framework, "rails", r"\bRails\.application\b", 0.7),
    ]
}

fn default_dependency_rules() -> Vec<DependencyRule> {
    use Category::*;

    vec![
        // Python
        dep("django", Framework, "django", 0.75),
        dep("flask", Framework, "flask", 0.75),
        dep("fastapi", Framework, "fastapi", 0.75),
        dep("psycopg2", DataStore, "postgresql", 0.65),
        dep("psycopg2-binary", DataStore, "postgresql", 0.65),
        dep("psycopg", DataStore, "postgresql", 0.65),
        dep("asyncpg", DataStore, "postgresql", 0.65),
        dep("pgvector", DataStore, "postgresql", 0.65),
        dep("pymongo", DataStore, "mongodb", 0.65),
        dep("motor", DataStore, "mongodb", 0.6),
        dep("pymysql", DataStore, "mysql", 0.65),
        dep("mysqlclient", DataStore, "mysql", 0.65),
        dep("clickhouse-driver", DataStore, "clickhouse", 0.65),
        dep("clickhouse-connect", DataStore, "clickhouse", 0.65),
        // Shared names across ecosystems
        dep("redis", DataStore, "redis", 0.6),
        dep("elasticsearch", DataStore, "elasticsearch", 0.65),
        dep("mongodb", DataStore, "mongodb", 0.65),
        dep("pg", DataStore, "postgresql", 0.65),
        // JavaScript
        dep("express", Framework, "express", 0.75),
        dep("react", Framework, "react", 0.7),
        dep("vue", Framework, "vue", 0.7),
        dep("@angular/core", Framework, "angular", 0.7),
        dep("@nestjs/core", Framework, "nestjs", 0.75),
        dep("next", Framework, "nextjs", 0.7),
        dep("mongoose", DataStore, "mongodb", 0.65),
        dep("mysql", DataStore, "mysql", 0.65),
        dep("mysql2", DataStore, "mysql", 0.65),
        dep("ioredis", DataStore, "redis", 0.6),
        dep("@elastic/elasticsearch", DataStore, "elasticsearch", 0.65),
        dep("@clickhouse/client", DataStore, "clickhouse", 0.65),
        dep("@aws-sdk/client-dynamodb", DataStore, "dynamodb", 0.65),
        // JVM
        dep("spring-boot-starter*", Framework, "spring", 0.75),
        dep("postgresql", DataStore, "postgresql", 0.65),
        dep("mysql-connector-java", DataStore, "mysql", 0.65),
        dep("mysql-connector-j", DataStore, "mysql", 0.65),
        dep("mongodb-driver*", DataStore, "mongodb", 0.65),
        dep("jedis", DataStore, "redis", 0.6),
        dep("lettuce-core", DataStore, "redis", 0.6),
        dep("elasticsearch-java", DataStore, "elasticsearch", 0.65),
        dep("clickhouse-jdbc", DataStore, "clickhouse", 0.65),
        // Rust
        dep("axum", Framework, "axum", 0.75),
        dep("actix-web", Framework, "actix-web", 0.75),
        dep("rocket", Framework, "rocket", 0.75),
        dep("tokio-postgres", DataStore, "postgresql", 0.65),
        dep("postgres", DataStore, "postgresql", 0.65),
        dep("mysql_async", DataStore, "mysql", 0.65),
        dep("clickhouse", DataStore, "clickhouse", 0.65),
        // Go
        dep("github.com/gin-gonic/gin", Framework, "gin", 0.75),
        dep("github.com/labstack/echo*", Framework, "echo", 0.75),
        dep("github.com/lib/pq", DataStore, "postgresql", 0.65),
        dep("github.com/jackc/pgx*", DataStore, "postgresql", 0.65),
        dep("go.mongodb.org/mongo-driver*", DataStore, "mongodb", 0.65),
        dep("github.com/go-sql-driver/mysql", DataStore, "mysql", 0.65),
        dep("github.com/redis/go-redis*", DataStore, "redis", 0.6),
        dep("github.com/go-redis/redis*", DataStore, "redis", 0.6),
        dep("github.com/elastic/go-elasticsearch*", DataStore, "elasticsearch", 0.65),
        dep("github.com/clickhouse/clickhouse-go*", DataStore, "clickhouse", 0.65),
        // Ruby / PHP
        dep("rails", Framework, "rails", 0.75),
        dep("sinatra", Framework, "sinatra", 0.75),
        dep("mongoid", DataStore, "mongodb", 0.65),
        dep("laravel/framework", Framework, "laravel", 0.75),
        dep("symfony/framework-bundle", Framework, "symfony", 0.75),
        dep("predis/predis", DataStore, "redis", 0.6),
    ]
}

fn default_shape_rules() -> Vec<ShapeRule> {
    use Category::*;
    use ShapePattern::{Directory, ExtensionCensus};

    let census = |extension, subject, weight| {
        shape(
            ExtensionCensus {
                extension,
                min_files: 1,
            },
            Language,
            subject,
            weight,
        )
    };

    vec![
        shape(Directory(".github/workflows"), CiTool, "github-actions", 0.4),
        shape(Directory(".circleci"), CiTool, "circleci", 0.4),
        shape(Directory("src/main/java"), Language, "java", 0.35),
        shape(Directory("src/main/kotlin"), Language, "kotlin", 0.35),
        shape(Directory("app/controllers"), Framework, "rails", 0.3),
        census("py", "python", 0.3),
        census("js", "javascript", 0.25),
        census("mjs", "javascript", 0.25),
        census("jsx", "javascript", 0.25),
        census("ts", "typescript", 0.3),
        census("tsx", "typescript", 0.3),
        census("java", "java", 0.3),
        census("kt", "kotlin", 0.3),
        census("go", "go", 0.3),
        census("rs", "rust", 0.3),
        census("rb", "ruby", 0.3),
        census("php", "php", 0.3),
        census("cs", "csharp", 0.3),
        census("ex", "elixir", 0.3),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    #[test]
    fn test_default_weights_stay_inside_family_bands() {
        let catalog = SignalCatalog::with_defaults();
        for (kind, subject, weight) in catalog.weights() {
            assert!(
                kind.band().contains(weight),
                "{kind} rule for {subject} has weight {weight} outside its band"
            );
        }
    }

    #[test]
    fn test_requirements_marker_rules() {
        let catalog = SignalCatalog::with_defaults();
        let rules: Vec<_> = catalog.markers_for("requirements.txt").collect();
        assert_eq!(rules.len(), 2);
        assert!(rules
            .iter()
            .any(|r| r.category == Category::Language && r.subject == "python"));
    }

    #[test]
    fn test_suffix_marker() {
        let catalog = SignalCatalog::with_defaults();
        assert!(catalog
            .markers_for("Api.csproj")
            .any(|r| r.subject == "csharp"));
    }

    #[parameterized(
        exact = { "pg", Some("postgresql") },
        prefix = { "spring-boot-starter-web", Some("spring") },
        go_module = { "github.com/jackc/pgx/v5", Some("postgresql") },
        unknown = { "left-pad", None },
    )]
    fn test_dependency_matching(name: &str, subject: Option<&str>) {
        let catalog = SignalCatalog::with_defaults();
        let found = catalog.dependency_rules_for(name).next().map(|r| r.subject);
        assert_eq!(found, subject);
    }

    #[parameterized(
        plain = { "postgres://u:p@db:5432/app", true },
        driver_suffix = { "postgresql+asyncpg://db/app", true },
        unrelated = { "https://example.com", false },
    )]
    fn test_postgres_connection_string_rule(text: &str, expected: bool) {
        let catalog = SignalCatalog::with_defaults();
        let rule = catalog
            .content
            .iter()
            .find(|r| r.subject == "postgresql" && r.scope == ContentScope::Any)
            .unwrap();
        assert_eq!(rule.pattern.is_match(text), expected);
    }

    #[test]
    fn test_compose_image_rule_matches_pgvector() {
        let catalog = SignalCatalog::with_defaults();
        let rule = catalog
            .content
            .iter()
            .find(|r| r.subject == "postgresql" && r.scope == ContentScope::Compose)
            .unwrap();
        assert!(rule.pattern.is_match("services:\n  db:\n    image: pgvector/pgvector:pg16\n"));
        assert!(rule.pattern.is_match("    image: \"postgres:16\"\n"));
        assert!(!rule.pattern.is_match("    image: redis:7\n"));
    }

    #[test]
    fn test_compose_file_detection() {
        assert!(is_compose_file("docker-compose.yml"));
        assert!(is_compose_file("docker-compose.prod.yaml"));
        assert!(is_compose_file("compose.yaml"));
        assert!(!is_compose_file("compose.json"));
    }
}
