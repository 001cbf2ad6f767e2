use clap::Parser;
use clap::Subcommand;
use common::cfg::SeedCfg;
use common::cfg::DEFAULT_COMMENT_SHARDS;
use common::cfg::DEFAULT_LINK_BATCH_SIZE;
use common::cfg::DEFAULT_POST_SHARDS;
use common::create_db_client;
use common::create_statsd;
use common::error::SeedError;
use common::error::SeedResult;
use common::pipeline::Seeder;
use common::shard::ShardDirs;
use common::store::db_rpc::DbRpcStore;
use common::store::sqlite::SqliteStore;
use common::store::Store;
use service_toolkit::panic::set_up_panic_hook;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Seed a relational store from a sharded forum post/comment dump")]
struct Args {
  #[command(subcommand)]
  stage: Option<Stage>,

  /// Directory containing `posts/`, `comments/` and `parents/`.
  #[arg(long, env = "SEED_DATA_DIR", default_value = "sample_data")]
  data_dir: PathBuf,

  #[arg(long, default_value_t = DEFAULT_POST_SHARDS)]
  post_shards: u32,

  #[arg(long, default_value_t = DEFAULT_COMMENT_SHARDS)]
  comment_shards: u32,

  #[arg(long, default_value_t = DEFAULT_LINK_BATCH_SIZE as u64, value_parser = clap::value_parser!(u64).range(1..))]
  link_batch_size: u64,

  /// Shards loaded concurrently by the post and comment stages.
  #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
  concurrency: u64,

  #[arg(long, default_value_t = 0)]
  first_shard: u32,

  #[arg(long)]
  last_shard: Option<u32>,

  /// Use a local SQLite database instead of db-rpc.
  #[arg(long)]
  sqlite: Option<PathBuf>,

  #[arg(long, env = "DB_RPC_ENDPOINT", default_value = "http://127.0.0.1:8080")]
  db_rpc_endpoint: String,

  #[arg(long, env = "DB_RPC_API_KEY", hide_env_values = true)]
  db_rpc_api_key: Option<String>,

  #[arg(long, env = "DB_RPC_DATABASE", default_value = "forum")]
  db_rpc_database: String,

  #[arg(long, env = "STATSD_ADDR")]
  statsd_addr: Option<String>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
  /// Posts, then comments, then parent links.
  All,
  Posts,
  Comments,
  Parents,
}

async fn run<S: Store>(args: &Args, cfg: SeedCfg, store: S) -> SeedResult<()> {
  let statsd = create_statsd("seed", args.statsd_addr.as_deref())
    .map_err(SeedError::Metrics)?;
  let seeder = Seeder::new(cfg, store, statsd);
  match args.stage.unwrap_or(Stage::All) {
    Stage::All => {
      seeder.run_all().await?;
    }
    Stage::Posts => {
      seeder.load_posts().await?;
    }
    Stage::Comments => {
      seeder.load_comments().await?;
    }
    Stage::Parents => {
      seeder.link_parents().await?;
    }
  };
  Ok(())
}

#[tokio::main]
async fn main() {
  set_up_panic_hook();

  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .json()
    .init();

  let args = Args::parse();
  let cfg = SeedCfg {
    post_shards: args.post_shards,
    comment_shards: args.comment_shards,
    link_batch_size: args.link_batch_size as usize,
    concurrency: args.concurrency as usize,
    first_shard: args.first_shard,
    last_shard: args.last_shard,
    ..SeedCfg::new(ShardDirs::new(&args.data_dir))
  };

  let res = match &args.sqlite {
    Some(path) => match SqliteStore::open(path) {
      Ok(store) => run(&args, cfg, store).await,
      Err(err) => Err(err),
    },
    None => {
      let db = create_db_client(
        args.db_rpc_endpoint.clone(),
        args.db_rpc_api_key.clone(),
        &args.db_rpc_database,
      );
      run(&args, cfg, DbRpcStore::new(db)).await
    }
  };
  if let Err(err) = res {
    tracing::error!(error = %err, "seeding failed");
    std::process::exit(1);
  };
}
