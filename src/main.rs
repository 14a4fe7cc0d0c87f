use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use wash_assistant::assistant::Assistant;
use wash_assistant::catalog::Catalog;
use wash_assistant::llm::ChatClient;
use wash_assistant::semantic_index::embedder::HttpEmbedder;
use wash_assistant::semantic_index::{SemanticIndex, DEFAULT_TOP_K};
use wash_assistant::table_store::TableStore;

#[derive(Parser)]
#[command(name = "wash-assistant")]
#[command(about = "Natural-language analytics assistant for water and sanitation datasets")]
struct Args {
    /// The question to answer, in natural language
    question: String,

    /// Directory containing the dataset CSV files
    #[arg(short, long, default_value = "data")]
    data_dir: PathBuf,

    /// Directory holding the persisted semantic index
    #[arg(long, default_value = "semantic_index")]
    index_dir: PathBuf,

    /// Chat model API key (or set GROQ_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// Embeddings API key (or set EMBEDDINGS_API_KEY)
    #[arg(long)]
    embeddings_api_key: Option<String>,

    /// Number of documents to retrieve per question
    #[arg(long, default_value_t = DEFAULT_TOP_K)]
    top_k: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let api_key = args
        .api_key
        .or_else(|| std::env::var("GROQ_API_KEY").ok())
        .context("GROQ_API_KEY is not set")?;
    let embeddings_api_key = args
        .embeddings_api_key
        .or_else(|| std::env::var("EMBEDDINGS_API_KEY").ok())
        .context("EMBEDDINGS_API_KEY is not set")?;

    let catalog = Catalog::water_utility(&args.data_dir);
    let tables = Arc::new(TableStore::load(&catalog)?);
    info!("Loaded {} datasets", tables.len());

    let mut chat = ChatClient::new(api_key)?;
    if let Ok(base_url) = std::env::var("GROQ_BASE_URL") {
        chat = chat.with_base_url(base_url);
    }

    let mut embedder = HttpEmbedder::new(embeddings_api_key)?;
    if let Ok(base_url) = std::env::var("EMBEDDINGS_BASE_URL") {
        embedder = embedder.with_base_url(base_url);
    }

    let index = Arc::new(
        SemanticIndex::open(&catalog, &tables, Arc::new(embedder), &args.index_dir).await?,
    );
    info!("Semantic index ready ({} documents)", index.len());

    let assistant = Assistant::new(tables, index, Arc::new(chat)).with_top_k(args.top_k);
    let answer = assistant.answer(&args.question).await;
    println!("{}", answer);

    Ok(())
}
