mod commands;

fn main() {
    survivor::logging::init();
    commands::run();
}
