use lsh::Interpreter;

fn main() {
    let mut shell = Interpreter::default();
    if let Err(e) = shell.repl() {
        eprintln!("lsh: {e}");
        std::process::exit(1);
    }
}
