fn main() {
    std::process::exit(secretscan::app::startup::run());
}
