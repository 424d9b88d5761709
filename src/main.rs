use tempslot::projects::cli;

fn main() {
    cli::start_cli();
}
