fn main() {
    pkgtrail::run_cli();
}
