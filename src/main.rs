fn main() {
    audiodiag::cli::run();
}
