use crate::config::StrategyType;
use crate::data::Bar;
use crate::indicators::SIGNAL_COLUMN;
use crate::strategy::{Signal, Strategy};
use chrono::NaiveDate;
use indexmap::IndexMap;
use log::debug;
use thiserror::Error;

//builds a fresh strategy instance; shared across batch workers
pub type StrategyFactory = Box<dyn Fn() -> Box<dyn Strategy> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    #[error("strategy '{0}' is already registered")]
    Duplicate(String),

    #[error("unknown strategy '{name}' (available: {available})")]
    Unknown { name: String, available: String },

    #[error("strategy '{name}' failed its load check: {reason}")]
    ContractViolation { name: String, reason: String },
}

//name -> factory table, in registration order
#[derive(Default)]
pub struct StrategyRegistry {
    factories: IndexMap<String, StrategyFactory>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    //registry holding every built-in strategy with default parameters
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for kind in StrategyType::ALL {
            registry.factories.insert(
                kind.key().to_string(),
                Box::new(move || kind.default_params().build()),
            );
        }
        registry
    }

    //adds a factory after exercising one instance on a synthetic history
    pub fn register<F>(&mut self, name: &str, factory: F) -> Result<(), RegistryError>
    where
        F: Fn() -> Box<dyn Strategy> + Send + Sync + 'static,
    {
        if self.factories.contains_key(name) {
            return Err(RegistryError::Duplicate(name.to_string()));
        }

        self_check(factory().as_ref()).map_err(|reason| RegistryError::ContractViolation {
            name: name.to_string(),
            reason,
        })?;

        debug!("registered strategy {}", name);
        self.factories.insert(name.to_string(), Box::new(factory));
        Ok(())
    }

    pub fn create(&self, name: &str) -> Result<Box<dyn Strategy>, RegistryError> {
        match self.factories.get(name) {
            Some(factory) => Ok(factory()),
            None => Err(RegistryError::Unknown {
                name: name.to_string(),
                available: self.names().join(", "),
            }),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(|k| k.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

//wavy price series long enough to take every built-in strategy past a short warmup
fn synthetic_history(len: usize) -> Vec<Bar> {
    let start = NaiveDate::from_ymd_opt(2000, 1, 3).unwrap_or_default();
    (0..len)
        .map(|i| {
            let x = i as f64;
            let close = 100.0 + 10.0 * (x / 7.0).sin() + 0.1 * x;
            Bar::new_unchecked(
                start + chrono::Duration::days(i as i64),
                close - 0.5,
                close + 1.0,
                close - 1.0,
                close,
                1_000.0 + 100.0 * (x / 3.0).cos(),
            )
        })
        .collect()
}

//frames must keep one row per bar and signals must stay in {-1, 0, 1} or be undefined
fn self_check(strategy: &dyn Strategy) -> Result<(), String> {
    let history = synthetic_history(60);

    for len in [1, 30, history.len()] {
        let slice = &history[..len];

        let frame = strategy.calculate_indicators(slice);
        if frame.len() != len {
            return Err(format!(
                "calculate_indicators returned {} rows for {} bars",
                frame.len(),
                len
            ));
        }

        let frame = strategy.generate_signals(frame);
        if frame.len() != len {
            return Err(format!(
                "generate_signals returned {} rows for {} bars",
                frame.len(),
                len
            ));
        }

        if let Some(column) = frame.column(SIGNAL_COLUMN) {
            if let Some(bad) = column
                .iter()
                .find(|v| !v.is_nan() && Signal::from_value(**v).is_none())
            {
                return Err(format!("signal value {} outside {{-1, 0, 1}}", bad));
            }
        }
    }

    Ok(())
}
