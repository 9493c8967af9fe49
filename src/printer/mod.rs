//! Terminal rendering of execution results.

use owo_colors::OwoColorize;

use crate::engine::RunOutput;
use crate::script::value::Value;

pub fn print_output(out: &RunOutput) {
    match out.value.as_envelope() {
        Some(("plot", Value::Str(path))) => {
            println!("{} {}", "chart written to".cyan(), path);
        }
        Some((_, Value::Table(table))) => {
            print!("{}", table.render());
        }
        Some((_, value)) => {
            println!("{}", value.render().green());
        }
        None => match &out.value {
            Value::Table(table) => print!("{}", table.render()),
            other => println!("{}", other.render().green()),
        },
    }
}
