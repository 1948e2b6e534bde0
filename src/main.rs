use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use std::path::PathBuf;
use tradetest::prelude::*;

#[derive(Parser)]
#[command(name = "tradetest")]
#[command(about = "A Rust-based day-bar strategy backtesting engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    //run a single backtest
    Run(RunArgs),

    //run strategies x symbols in parallel
    Batch(BatchArgs),

    //list registered strategies
    Strategies,
}

#[derive(Args)]
struct RunArgs {
    //json configuration file; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    //path to csv data file
    #[arg(long)]
    data: Option<PathBuf>,

    //symbol to trade
    #[arg(long)]
    symbol: Option<String>,

    //strategy type (sma, rsi, breakout, ratchet)
    #[arg(long)]
    strategy: Option<String>,

    //first date to simulate (YYYY-MM-DD)
    #[arg(long)]
    start: Option<NaiveDate>,

    //last date to simulate (YYYY-MM-DD)
    #[arg(long)]
    end: Option<NaiveDate>,

    #[command(flatten)]
    engine: EngineArgs,

    #[command(flatten)]
    params: ParamArgs,

    //output options
    //output path for the full json result
    #[arg(long)]
    output_json: Option<PathBuf>,

    //output path for equity curve csv
    #[arg(long)]
    output_equity_csv: Option<PathBuf>,

    //output path for trades csv
    #[arg(long)]
    output_trades_csv: Option<PathBuf>,

    //write the effective configuration to this json file
    #[arg(long)]
    save_config: Option<PathBuf>,
}

#[derive(Args)]
struct BatchArgs {
    //path to csv data file
    #[arg(long)]
    data: PathBuf,

    //comma separated symbols
    #[arg(long, value_delimiter = ',', required = true)]
    symbols: Vec<String>,

    //comma separated registry names, defaults to every registered strategy
    #[arg(long, value_delimiter = ',')]
    strategies: Vec<String>,

    #[arg(long)]
    start: Option<NaiveDate>,

    #[arg(long)]
    end: Option<NaiveDate>,

    #[command(flatten)]
    engine: EngineArgs,

    //directory for one json result per unit
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[derive(Args)]
struct EngineArgs {
    //initial account balance
    #[arg(long)]
    initial_capital: Option<f64>,

    //commission as a fraction of notional per side
    #[arg(long)]
    commission: Option<f64>,

    //leverage when the strategy gives none
    #[arg(long)]
    leverage: Option<f64>,

    //hard stop loss from entry, as a fraction
    #[arg(long)]
    stop_loss: Option<f64>,

    //trailing stop from the best close, as a fraction
    #[arg(long)]
    trailing_stop: Option<f64>,

    //bars of history handed to the strategy
    #[arg(long)]
    max_lookback: Option<usize>,
}

impl EngineArgs {
    fn apply(&self, mut config: BacktestConfig) -> BacktestConfig {
        if let Some(v) = self.initial_capital {
            config.initial_capital = v;
        }
        if let Some(v) = self.commission {
            config.commission_rate = v;
        }
        if let Some(v) = self.leverage {
            config.default_leverage = v;
        }
        if self.stop_loss.is_some() {
            config.stop_loss_pct = self.stop_loss;
        }
        if self.trailing_stop.is_some() {
            config.trailing_stop_pct = self.trailing_stop;
        }
        if let Some(v) = self.max_lookback {
            config.max_lookback = v;
        }
        config
    }
}

#[derive(Args)]
struct ParamArgs {
    //sma strategy parameters
    //fast sma window
    #[arg(long)]
    fast: Option<usize>,

    //slow sma window
    #[arg(long)]
    slow: Option<usize>,

    //rsi strategy parameters (rsi and ratchet)
    //rsi lookback period
    #[arg(long)]
    rsi_period: Option<usize>,

    //rsi oversold threshold
    #[arg(long)]
    oversold: Option<f64>,

    //rsi overbought threshold
    #[arg(long)]
    overbought: Option<f64>,

    //breakout strategy parameters
    //lookback for the breakout high
    #[arg(long)]
    breakout_period: Option<usize>,

    //adx trend strength threshold
    #[arg(long)]
    adx_threshold: Option<f64>,

    //common strategy parameter
    //fraction of portfolio value per entry (sma, rsi)
    #[arg(long)]
    allocation: Option<f64>,
}

impl ParamArgs {
    fn apply(&self, mut params: StrategyParams) -> StrategyParams {
        match &mut params {
            StrategyParams::Sma(p) => {
                p.fast_window = self.fast.unwrap_or(p.fast_window);
                p.slow_window = self.slow.unwrap_or(p.slow_window);
                p.allocation = self.allocation.unwrap_or(p.allocation);
            }
            StrategyParams::Rsi(p) => {
                p.rsi_period = self.rsi_period.unwrap_or(p.rsi_period);
                p.oversold = self.oversold.unwrap_or(p.oversold);
                p.overbought = self.overbought.unwrap_or(p.overbought);
                p.allocation = self.allocation.unwrap_or(p.allocation);
            }
            StrategyParams::Breakout(p) => {
                p.breakout_period = self.breakout_period.unwrap_or(p.breakout_period);
                p.adx_threshold = self.adx_threshold.unwrap_or(p.adx_threshold);
            }
            StrategyParams::Ratchet(p) => {
                p.rsi_period = self.rsi_period.unwrap_or(p.rsi_period);
                p.rsi_oversold = self.oversold.unwrap_or(p.rsi_oversold);
                p.rsi_overbought = self.overbought.unwrap_or(p.rsi_overbought);
            }
        }
        params
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run_backtest(args),
        Commands::Batch(args) => run_batch_command(args),
        Commands::Strategies => {
            for name in StrategyRegistry::builtin().names() {
                println!("{}", name);
            }
            Ok(())
        }
    }
}

//defaults with environment overrides, or a config file; flags win over both
fn resolve_configuration(args: &RunArgs) -> Result<BacktestConfiguration> {
    let mut configuration = match &args.config {
        Some(path) => BacktestConfiguration::from_json_file(path)?,
        None => BacktestConfiguration {
            engine: BacktestConfig::default().with_env_overrides(),
            ..BacktestConfiguration::default()
        },
    };

    if let Some(data) = &args.data {
        configuration.data_path = data.clone();
    } else if args.config.is_none() {
        anyhow::bail!("--data is required without --config");
    }

    if let Some(symbol) = &args.symbol {
        configuration.symbol = symbol.clone();
    } else if args.config.is_none() {
        anyhow::bail!("--symbol is required without --config");
    }

    if let Some(name) = &args.strategy {
        let strategy_type = StrategyType::parse(name)
            .ok_or_else(|| anyhow::anyhow!("Unknown strategy: {}", name))?;
        if strategy_type != configuration.strategy.strategy_type() {
            configuration.strategy = strategy_type.default_params();
        }
    }

    configuration.strategy = args.params.apply(configuration.strategy);
    configuration.engine = args.engine.apply(configuration.engine);
    configuration.start_date = args.start.or(configuration.start_date);
    configuration.end_date = args.end.or(configuration.end_date);

    if args.output_json.is_some() {
        configuration.output_json = args.output_json.clone();
    }
    if args.output_equity_csv.is_some() {
        configuration.output_equity_csv = args.output_equity_csv.clone();
    }
    if args.output_trades_csv.is_some() {
        configuration.output_trades_csv = args.output_trades_csv.clone();
    }

    Ok(configuration)
}

fn run_backtest(args: RunArgs) -> Result<()> {
    let configuration = resolve_configuration(&args)?;

    if let Some(path) = &args.save_config {
        configuration.to_json_file(path)?;
        info!("configuration saved to {:?}", path);
    }

    println!("Tradetest Backtesting Engine");
    println!("============================\n");

    //load data
    println!("Loading data from {:?}...", configuration.data_path);
    let provider = CsvDataProvider::new(&configuration.data_path);
    let data = provider
        .fetch(
            &configuration.symbol,
            configuration.start_date,
            configuration.end_date,
        )
        .with_context(|| format!("Failed to load data from {:?}", configuration.data_path))?;

    match (data.first_date(), data.last_date()) {
        (Some(first), Some(last)) => {
            println!("Loaded {} bars for {}", data.len(), data.symbol());
            println!("Date range: {} to {}\n", first, last);
        }
        _ => warn!("no bars for {} in the requested range", data.symbol()),
    }

    //create strategy
    let mut strategy = configuration.strategy.build();
    println!("Strategy: {}", strategy.name());
    println!("Initial capital: ${:.2}", configuration.engine.initial_capital);
    println!(
        "Commission: {:.3}% per side\n",
        configuration.engine.commission_rate * 100.0
    );

    //run backtest
    println!("Running backtest...\n");
    let mut engine = BacktestEngine::new(configuration.engine.clone())?;
    let result = engine.run(strategy.as_mut(), &data);

    //display results
    println!("Backtest Results");
    println!("================\n");
    result.summary.pretty_print_table();

    if !result.anomalies.is_empty() {
        println!("\n{} anomalies recorded:", result.anomalies.len());
        for anomaly in &result.anomalies {
            println!("  {}", anomaly);
        }
    }

    //save outputs if requested
    if let Some(path) = &configuration.output_json {
        write_json(&result, path)?;
        println!("\nResult saved to {:?}", path);
    }

    if let Some(path) = &configuration.output_equity_csv {
        write_equity_csv(&result.equity_curve, path)?;
        println!("Equity curve saved to {:?}", path);
    }

    if let Some(path) = &configuration.output_trades_csv {
        write_trades_csv(&result.trades, path)?;
        println!("Trades saved to {:?}", path);
    }

    Ok(())
}

fn run_batch_command(args: BatchArgs) -> Result<()> {
    let config = args.engine.apply(BacktestConfig::default().with_env_overrides());
    let registry = StrategyRegistry::builtin();

    let strategies: Vec<String> = if args.strategies.is_empty() {
        registry.names().iter().map(|s| s.to_string()).collect()
    } else {
        args.strategies.clone()
    };

    let provider = CsvDataProvider::new(&args.data);
    let data = args
        .symbols
        .iter()
        .map(|symbol| {
            provider
                .fetch(symbol, args.start, args.end)
                .with_context(|| format!("Failed to load {} from {:?}", symbol, args.data))
        })
        .collect::<Result<Vec<MarketData>>>()?;

    let outcomes = run_batch(&registry, &strategies, &data, &config);
    summary_table(&outcomes).printstd();

    if let Some(dir) = &args.output_dir {
        std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
        for outcome in &outcomes {
            if let Ok(result) = &outcome.result {
                let path = dir.join(format!("{}_{}.json", outcome.strategy, outcome.symbol));
                write_json(result, &path)?;
            }
        }
        println!("\nResults saved to {:?}", dir);
    }

    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    if failed > 0 {
        warn!("{} of {} units failed", failed, outcomes.len());
    }

    Ok(())
}
