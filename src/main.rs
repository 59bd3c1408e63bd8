//! 翻译资源检查工具
//!
//! 读取记录集合的 JSON 导出目录，列出可服务的语言对、解析翻译路线，
//! 以及按语言下载或删除附件。

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use translations_engine::env::{self, EnvVar};
use translations_engine::translation::{
    ConfigManager, JsonFileCollection, LanguagePairResolver, RecordCatalog, RecordCollection,
    TranslationResult, TranslationsConfig,
};
use translations_engine::translation::pipeline::{AssetManager, DownloadManager};

#[derive(Parser)]
#[command(name = "translations-cli")]
#[command(about = "Inspect translation model and engine record collections")]
struct Cli {
    /// 模型集合导出目录
    #[arg(long, global = true, default_value = "translations-models")]
    models: PathBuf,
    /// WASM 集合导出目录
    #[arg(long, global = true, default_value = "translations-wasm")]
    wasm: PathBuf,
    /// 配置文件（TOML 或 JSON）
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 列出可服务的语言对
    Pairs,
    /// 解析翻译路线并列出需要的记录
    Route {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
    },
    /// 列出支持的源语言和目标语言
    Languages,
    /// 下载某个语言的全部文件
    Download { language: String },
    /// 删除某个语言独占的文件
    Delete { language: String },
    /// 写出示例配置文件
    ExampleConfig { path: PathBuf },
    /// 打印支持的环境变量
    EnvDocs,
}

fn init_tracing() {
    let level = env::core::LogLevel::get_or_default("info".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> TranslationResult<TranslationsConfig> {
    match path {
        Some(path) => {
            let mut config = ConfigManager::load_from_file(&path.to_string_lossy())?;
            config.apply_env_overrides();
            config.validate()?;
            Ok(config)
        }
        None => Ok(ConfigManager::new()?.into_config()),
    }
}

struct Catalogs {
    config: Arc<TranslationsConfig>,
    catalog: Arc<RecordCatalog>,
    pairs: Arc<LanguagePairResolver>,
}

impl Catalogs {
    fn open(cli: &Cli) -> TranslationResult<Self> {
        let config = Arc::new(load_config(cli.config.as_ref())?);
        let models: Arc<dyn RecordCollection> = Arc::new(JsonFileCollection::new(
            config.models_collection.clone(),
            cli.models.clone(),
        ));
        let wasm: Arc<dyn RecordCollection> = Arc::new(JsonFileCollection::new(
            config.wasm_collection.clone(),
            cli.wasm.clone(),
        ));
        let catalog = Arc::new(RecordCatalog::new(models, wasm, Arc::clone(&config)));
        let pairs = Arc::new(LanguagePairResolver::new(
            Arc::clone(&catalog),
            config.pivot_language.clone(),
        ));
        Ok(Self {
            config,
            catalog,
            pairs,
        })
    }

    fn assets(&self) -> AssetManager {
        AssetManager::new(
            Arc::clone(&self.catalog),
            Arc::clone(&self.pairs),
            DownloadManager::from_config(&self.config),
        )
    }
}

async fn run(cli: Cli) -> TranslationResult<()> {
    match &cli.command {
        Commands::ExampleConfig { path } => {
            ConfigManager::generate_example_config(&path.to_string_lossy())?;
            println!("已写入示例配置: {}", path.display());
        }
        Commands::EnvDocs => {
            println!("{}", env::generate_env_docs());
        }
        Commands::Pairs => {
            let catalogs = Catalogs::open(&cli)?;
            let records = catalogs.catalog.get_model_records().await?;
            for pair in catalogs.pairs.get_language_pairs().await?.iter() {
                println!("{}", pair.key());
            }
            for gap in &records.pivot_gaps {
                println!("# 已移除 {} (缺少 {})", gap.pair, gap.missing);
            }
        }
        Commands::Route { from, to } => {
            let catalogs = Catalogs::open(&cli)?;
            let route = catalogs.pairs.resolve_route(from, to).await?;
            println!("{}", route);
            let records = catalogs.catalog.get_model_records().await?;
            for leg in route.legs() {
                for record in records.records_for_pair(&leg) {
                    println!(
                        "  {} {} {} ({} 字节)",
                        leg,
                        record.name,
                        record.version,
                        record.attachment.size
                    );
                }
            }
        }
        Commands::Languages => {
            let catalogs = Catalogs::open(&cli)?;
            let supported = catalogs.pairs.supported_languages().await?;
            println!("from: {}", supported.from_languages.join(", "));
            println!("to:   {}", supported.to_languages.join(", "));
        }
        Commands::Download { language } => {
            let catalogs = Catalogs::open(&cli)?;
            let count = catalogs.assets().download_language_files(language).await?;
            println!("已下载 {} 的 {} 个文件", language, count);
        }
        Commands::Delete { language } => {
            let catalogs = Catalogs::open(&cli)?;
            let count = catalogs.assets().delete_language_files(language).await?;
            println!("已删除 {} 的 {} 个文件", language, count);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            translations_engine::translation::error::helpers::log_error(&e);
            eprintln!("错误: {}", e);
            ExitCode::FAILURE
        }
    }
}
