//! Character prompt lookups

use modelvault_catalogue::CharacterBook;
use modelvault_core::VaultConfig;

pub fn run(
    config: &VaultConfig,
    name: Option<&str>,
    option: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let book = CharacterBook::load(&config.characters_path)?;

    match (name, option) {
        (None, _) => {
            if book.is_empty() {
                println!("No characters defined.");
                return Ok(());
            }
            println!("=== Characters ===");
            for name in book.names() {
                println!("  {}", name);
            }
            println!();
            println!("Options: {}", book.all_options().join(", "));
        }
        (Some(name), None) => {
            let options = book.options_for(name);
            if options.is_empty() {
                return Err(format!("Unknown character: {}", name).into());
            }
            println!("=== {} ===", name);
            for option in options {
                println!("  {}", option);
            }
        }
        (Some(name), Some(option)) => println!("{}", book.prompt_for(name, option)),
    }
    Ok(())
}
