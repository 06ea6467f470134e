fn main() {
    sigtest::cli::run();
}
