pub mod dispatch;
pub mod output;
pub mod report;

use colored::Colorize;

const BANNER: &str = r#"
        _ _ _
  _ __ (_) | | __ _  __ _  ___
 | '_ \| | | |/ _` |/ _` |/ _ \
 | |_) | | | | (_| | (_| |  __/
 | .__/|_|_|_|\__,_|\__, |\___|
 |_|                |___/
"#;

pub fn print_banner() {
    println!("{}", BANNER.bright_red().bold());
    println!(
        "  {} v{}\n",
        "loot builds from exposed Jenkins servers".bright_white(),
        env!("CARGO_PKG_VERSION")
    );
}
