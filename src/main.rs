fn main() {
    std::process::exit(apmc_launcher_lib::run())
}
