use std::io::{self, Write};

use serde::Serialize;

use crate::chain::Chain;
use crate::registry::DataSources;

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_chain(chain: &Chain) -> io::Result<()> {
        Self::print_json(chain)
    }

    pub fn print_sources(sources: &DataSources) -> io::Result<()> {
        Self::print_json(&sources.to_specs())
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}
