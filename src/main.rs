fn main() {
    std::process::exit(hql::cli::run());
}
