fn main() {
    torque_pipeline::cli::run();
}
