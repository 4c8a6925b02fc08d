use std::path::{Path, PathBuf};
use std::sync::Arc;
use vitrine::catalog::Catalog;
use vitrine::cli::{Cli, Commands, ConfigAction};
use vitrine::config::Config;
use vitrine::embedding::{FastEmbedClipProvider, FastEmbedProvider};
use vitrine::error::{Result, VitrineError};
use vitrine::evaluation::{load_labels, load_queries};
use vitrine::index::{ArtifactBundle, BundleStore, DirectorySource, IndexBuilder};
use vitrine::retrieval::{load_reranker, FusionWeights, SearchResult};
use vitrine::service::SearchService;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose);

    // Handle commands
    match cli.command {
        Commands::Build { catalog, output } => {
            cmd_build(cli.config, cli.profile, catalog, output).await?;
        }
        Commands::Search {
            query,
            k,
            text_weight,
            image_weight,
            keyword_weight,
            no_rerank,
            json,
        } => {
            let overrides = WeightOverrides {
                text: text_weight,
                image: image_weight,
                keyword: keyword_weight,
            };
            cmd_search(cli.config, cli.profile, &query, k, overrides, no_rerank, json).await?;
        }
        Commands::Evaluate {
            queries,
            labels,
            json,
        } => {
            cmd_evaluate(cli.config, cli.profile, queries, labels, json).await?;
        }
        Commands::Info { dir } => {
            cmd_info(cli.config, dir)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, cli.profile, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "vitrine=debug" } else { "vitrine=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt().with_env_filter(filter).with_target(false).init();
}

struct WeightOverrides {
    text: Option<f32>,
    image: Option<f32>,
    keyword: Option<f32>,
}

impl WeightOverrides {
    fn is_empty(&self) -> bool {
        self.text.is_none() && self.image.is_none() && self.keyword.is_none()
    }

    fn apply(&self, base: FusionWeights) -> Result<FusionWeights> {
        FusionWeights::new(
            self.text.unwrap_or(base.text),
            self.image.unwrap_or(base.image),
            self.keyword.unwrap_or(base.keyword),
        )
        .map_err(|e| VitrineError::InvalidConfigValue {
            path: "search".to_string(),
            message: e.to_string(),
        })
    }
}

fn build_service(config: Config) -> Result<SearchService> {
    let text = Arc::new(FastEmbedProvider::new(&config.embedding.text_model)?);
    let cross_modal = Arc::new(FastEmbedClipProvider::new(&config.embedding.cross_modal_model)?);
    let reranker = load_reranker(&config.retrieval);

    let source = Arc::new(DirectorySource::new(config.artifacts.dir.clone()));
    let store = Arc::new(BundleStore::new(source));

    SearchService::new(config, store, text, cross_modal, reranker)
}

async fn cmd_build(
    config_path: Option<PathBuf>,
    profile: Option<String>,
    catalog: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<()> {
    let mut config = load_config(config_path, profile)?;
    if let Some(output) = output {
        config.artifacts.dir = output;
    }

    let catalog_path = catalog.unwrap_or_else(|| config.artifacts.catalog_file.clone());
    let catalog = Catalog::load_csv(&catalog_path)?;
    let out_dir = config.artifacts.dir.clone();

    let text = Arc::new(FastEmbedProvider::new(&config.embedding.text_model)?);
    let cross_modal = Arc::new(FastEmbedClipProvider::new(&config.embedding.cross_modal_model)?);
    let builder = IndexBuilder::from_config(&config, text, cross_modal)?;
    let source = DirectorySource::new(out_dir.clone());

    let report = tokio::task::spawn_blocking(move || builder.build_into(catalog, &source))
        .await
        .map_err(|e| VitrineError::Build(format!("Build task failed: {}", e)))??;

    println!("✓ Built bundle at {}", out_dir.display());
    println!("  Products: {}", report.rows);
    println!("  Text fallbacks: {}", report.text_fallbacks);
    println!("  Image fallbacks: {}", report.image_fallbacks);
    println!("  Duration: {}ms", report.duration_ms);

    Ok(())
}

async fn cmd_search(
    config_path: Option<PathBuf>,
    profile: Option<String>,
    query: &str,
    k: Option<usize>,
    overrides: WeightOverrides,
    no_rerank: bool,
    json: bool,
) -> Result<()> {
    let use_config_weights = profile.is_some();
    let config = load_config(config_path, profile)?;
    let config_weights = FusionWeights::new(
        config.retrieval.text_weight,
        config.retrieval.image_weight,
        config.retrieval.keyword_weight,
    )
    .map_err(|e| VitrineError::InvalidConfigValue {
        path: "retrieval".to_string(),
        message: e.to_string(),
    })?;

    let service = build_service(config)?;

    let mut request = service.default_request(query).await?;
    if use_config_weights {
        request.weights = config_weights;
    }
    if !overrides.is_empty() {
        request.weights = overrides.apply(request.weights)?;
    }
    if let Some(k) = k {
        request.k = k;
    }
    if no_rerank {
        request.rerank = false;
    }

    let results = service.search(request).await?;

    if json {
        let output = serde_json::to_string_pretty(&results)
            .map_err(|e| VitrineError::json(e, "Failed to serialize results"))?;
        println!("{}", output);
    } else {
        print_results(query, &results);
    }

    Ok(())
}

fn print_results(query: &str, results: &[SearchResult]) {
    if results.is_empty() {
        println!("No results for \"{}\"", query);
        return;
    }

    println!("Results for \"{}\"", query);
    for (rank, result) in results.iter().enumerate() {
        let product = &result.product;
        println!(
            "\n{:>2}. {} [{}]  score {:.3}",
            rank + 1,
            product.title,
            product.product_id,
            result.score
        );
        println!(
            "    text {:.3}  image {:.3}  keyword {:.3}",
            result.score_text, result.score_img, result.score_kw
        );
        println!(
            "    {} · {} · {}",
            product.color(),
            product.material(),
            product.sizes().join("/")
        );
        if !result.why_chips.is_empty() {
            println!("    why: {}", result.why_chips.join(", "));
        }
    }
}

async fn cmd_evaluate(
    config_path: Option<PathBuf>,
    profile: Option<String>,
    queries: Option<PathBuf>,
    labels: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let config = load_config(config_path, profile)?;

    let queries_path = queries.unwrap_or_else(|| config.evaluation.queries_file.clone());
    let queries = load_queries(&queries_path)?;
    let labels = labels
        .or_else(|| config.evaluation.labels_file.clone())
        .map(|path| load_labels(&path))
        .transpose()?;

    let service = build_service(config)?;
    let report = service.evaluate(queries, labels).await?;

    if json {
        let output = serde_json::to_string_pretty(&report)
            .map_err(|e| VitrineError::json(e, "Failed to serialize report"))?;
        println!("{}", output);
    } else {
        println!("Evaluation ({} queries)", report.total_queries);
        println!("==========");
        println!("  hit@1:            {:.3}", report.hit_at_1);
        println!("  recall@10:        {:.3}", report.recall_at_10);
        println!("  ndcg@10:          {:.3}", report.ndcg_at_10);
        println!("  zero-result rate: {:.3}", report.zero_result_rate);
    }

    Ok(())
}

fn cmd_info(config_path: Option<PathBuf>, dir: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path, None)?;
    let dir = dir.unwrap_or(config.artifacts.dir);

    let bundle = ArtifactBundle::load(&dir)?;
    let metadata = bundle.metadata();

    println!("Vitrine Bundle");
    println!("==============");
    println!("\nLocation: {}", dir.display());
    println!("Products: {}", metadata.num_products);
    println!("Built: {}", metadata.built_at.format("%Y-%m-%d %H:%M:%S"));
    println!(
        "\nText model: {} ({}D)",
        metadata.text_model, metadata.text_dim
    );
    println!(
        "Cross-modal model: {} ({}D)",
        metadata.cross_modal_model, metadata.img_dim
    );
    println!(
        "Default weights: text {:.2}, image {:.2}, keyword {:.2}",
        metadata.weights.text, metadata.weights.image, metadata.weights.keyword
    );

    Ok(())
}

fn cmd_config(
    config_path: Option<PathBuf>,
    profile: Option<String>,
    action: ConfigAction,
) -> Result<()> {
    match action {
        ConfigAction::Show { section } => {
            let config = load_config(config_path, profile)?;
            let value = serde_json::to_value(&config)
                .map_err(|e| VitrineError::json(e, "Failed to serialize config"))?;

            let value = match section {
                Some(section) => value.get(&section).cloned().ok_or_else(|| {
                    VitrineError::Config(format!("Unknown config section: {}", section))
                })?,
                None => value,
            };

            let json = serde_json::to_string_pretty(&value)
                .map_err(|e| VitrineError::json(e, "Failed to serialize config"))?;
            println!("{}", json);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            // Create parent directory
            if let Some(parent) = path.parent() {
                create_dir(parent)?;
            }

            Config::default().save(&path)?;

            println!("✓ Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn create_dir(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(path)
        .map_err(|e| VitrineError::io(e, format!("Failed to create config directory: {:?}", path)))
}

fn load_config(config_path: Option<PathBuf>, profile: Option<String>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    let mut config = if path.exists() {
        Config::load(&path)?
    } else {
        tracing::warn!(
            "Config file not found, using defaults. Run 'vitrine config init' to create one."
        );
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    };

    if let Some(profile) = profile {
        config.apply_profile(&profile)?;
    }

    Ok(config)
}
