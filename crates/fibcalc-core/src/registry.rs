//! Calculator factory and registry.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::calculator::{Calculator, FibCalculator, FibError};
use crate::context::CalcContext;
use crate::fastdoubling::OptimizedFastDoubling;
use crate::fft_based::FftBasedCalculator;
use crate::matrix::MatrixExponentiation;

/// Factory trait for creating calculators.
pub trait CalculatorFactory: Send + Sync {
    /// Get or create a calculator by name.
    fn get(&self, name: &str) -> Result<Arc<dyn Calculator>, FibError>;

    /// List all available calculator names.
    fn available(&self) -> Vec<&str>;
}

/// Default factory with lazy creation and cache. Every calculator it
/// builds shares one [`CalcContext`].
pub struct DefaultFactory {
    ctx: Arc<CalcContext>,
    cache: RwLock<HashMap<String, Arc<dyn Calculator>>>,
}

impl DefaultFactory {
    /// Create a factory whose calculators draw on `ctx`.
    #[must_use]
    pub fn new(ctx: Arc<CalcContext>) -> Self {
        Self {
            ctx,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// The context shared by this factory's calculators.
    #[must_use]
    pub fn context(&self) -> &Arc<CalcContext> {
        &self.ctx
    }

    fn create_calculator(&self, name: &str) -> Result<Arc<dyn Calculator>, FibError> {
        let ctx = Arc::clone(&self.ctx);
        let core: Arc<dyn crate::calculator::CoreCalculator> = match name {
            "fast" | "fastdoubling" => Arc::new(OptimizedFastDoubling::new(ctx)),
            "matrix" => Arc::new(MatrixExponentiation::new(ctx)),
            "fft" => Arc::new(FftBasedCalculator::new(ctx)),
            _ => {
                return Err(FibError::InvalidConfiguration(format!(
                    "unknown calculator: {name}"
                )))
            }
        };
        Ok(Arc::new(FibCalculator::new(core)))
    }
}

impl Default for DefaultFactory {
    fn default() -> Self {
        Self::new(Arc::new(CalcContext::default()))
    }
}

impl CalculatorFactory for DefaultFactory {
    fn get(&self, name: &str) -> Result<Arc<dyn Calculator>, FibError> {
        if let Some(calc) = self.cache.read().get(name) {
            return Ok(Arc::clone(calc));
        }

        let calc = self.create_calculator(name)?;
        // A racing caller may have inserted first; keep theirs.
        let mut cache = self.cache.write();
        let entry = cache.entry(name.to_string()).or_insert(calc);
        Ok(Arc::clone(entry))
    }

    fn available(&self) -> Vec<&str> {
        vec!["fast", "matrix", "fft"]
    }
}
