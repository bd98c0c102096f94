fn main() {
    env_logger::init();

    if handle_cli_flags() {
        return;
    }

    let options = match threadview::Options::from_args(std::env::args().skip(1)) {
        Ok(options) => options,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(2);
        }
    };

    if let Err(err) = threadview::run(options) {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

fn handle_cli_flags() -> bool {
    let mut saw_flag = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("threadview {}", threadview::VERSION);
                saw_flag = true;
            }
            "--help" | "-h" => {
                println!(
                    "threadview — Browse discussion threads and comments from the terminal.\n\nUsage: threadview [--offline] <thread-id>\n\n  --offline            Browse canned sample data without a network\n  --version, -V        Show version and exit\n  --help,    -h        Show this help message"
                );
                saw_flag = true;
            }
            _ => {}
        }
    }
    saw_flag
}
