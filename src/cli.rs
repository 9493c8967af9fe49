use clap::{ArgGroup, Parser};

#[derive(Parser, Debug, Clone)]
#[command(name = "tablegpt", about = "Ask questions about tabular data in natural language", version)]
#[command(group(ArgGroup::new("source").args(["question", "code"]).multiple(true)))]
pub struct Cli {
    /// The question to answer about the loaded tables.
    #[arg(value_name = "QUESTION")]
    pub question: Option<String>,

    /// Table file to load (.csv or .json array of records). Repeatable;
    /// order defines the positional indices the generated code sees.
    #[arg(short = 't', long = "table", value_name = "FILE", action = clap::ArgAction::Append)]
    pub table: Vec<String>,

    /// Defer loading table files until the generated code references them.
    #[arg(long)]
    pub lazy: bool,

    /// Expected result shape: dataframe, plot, string or number.
    #[arg(short = 'o', long = "output-type")]
    pub output_type: Option<String>,

    /// Large language model to use.
    #[arg(long)]
    pub model: Option<String>,

    /// Randomness of generated output.
    #[arg(long, default_value_t = 0.0, value_parser = clap::value_parser!(f32))]
    pub temperature: f32,

    /// Limits highest probable tokens (words).
    #[arg(long = "top-p", default_value_t = 1.0, value_parser = clap::value_parser!(f32))]
    pub top_p: f32,

    /// Maximum correction retries after a failed execution.
    #[arg(long = "max-retries")]
    pub max_retries: Option<usize>,

    /// Disable the error-correction framework (fail on the first error).
    #[arg(long = "no-correction")]
    pub no_correction: bool,

    /// Expose `execute_sql_query` backed by the first table's connector.
    #[arg(long = "direct-sql")]
    pub direct_sql: bool,

    /// Print the code before running it.
    #[arg(long = "show-code")]
    pub show_code: bool,

    /// Run this snippet verbatim instead of asking the model.
    #[arg(short = 'c', long = "code", value_name = "SNIPPET")]
    pub code: Option<String>,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}
