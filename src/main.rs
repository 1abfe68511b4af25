fn main() {
    std::process::exit(adbconnect_lib::run());
}
