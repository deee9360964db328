//! Print the store host's OpenAPI document as pretty JSON.

use kana_clash::services::documentation;

fn main() -> anyhow::Result<()> {
    println!("{}", documentation::openapi().to_pretty_json()?);
    Ok(())
}
