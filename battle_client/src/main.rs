use battle_client::Command;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let command = match Command::parse(std::env::args().skip(1)) {
        Ok(command) => command,
        Err(usage) => {
            eprintln!("{usage}");
            std::process::exit(2);
        }
    };
    battle_client::run_with_config(command).await
}
