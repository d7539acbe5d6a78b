use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    relais::cli::main()
}
