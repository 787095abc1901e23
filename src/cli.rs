use clap::Parser;

use crate::core::frequency::FrequencyStrategy;
use crate::function::Shape;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Args {
    /// Path to config TOML
    #[arg(long, default_value = "epicycles.toml")]
    pub config: String,

    /// Built-in shape to approximate (overrides config)
    #[arg(long, value_enum)]
    pub shape: Option<Shape>,

    /// Rotor count to settle on (defaults to the configured initial count)
    #[arg(long)]
    pub rotors: Option<usize>,

    /// Frequency strategy, e.g. `centered:1`, `range:-10:10`, `list:0,1,-1`
    #[arg(long)]
    pub strategy: Option<FrequencyStrategy>,

    /// Integration interval count (overrides config)
    #[arg(long)]
    pub intervals: Option<usize>,

    /// After settling, switch to this interval count and reload
    #[arg(long)]
    pub then_intervals: Option<usize>,

    /// Load on the calling thread instead of in the background
    #[arg(long, default_value_t = false)]
    pub sync: bool,

    /// Number of rotor states to print
    #[arg(long, default_value_t = 10)]
    pub print: usize,
}
