use std::cell::RefCell;
use std::fs;
use std::io::Write;
use std::rc::Rc;

use pretty_assertions::assert_eq;
use vm::{Engine, Outcome, VmResult};
use walkdir::WalkDir;

// Runs a script to completion, recording every suspension and the final value in `output`.
fn run_script(src: &str, output: &Rc<RefCell<Vec<u8>>>) -> VmResult<()> {
    let stdout: Rc<RefCell<dyn Write>> = output.clone();
    let mut engine = Engine::new(stdout);

    let program = engine.compile(src)?;
    let mut outcome = engine.run(&program)?;
    loop {
        match outcome {
            Outcome::Complete(value) => {
                writeln!(output.borrow_mut(), "=> {}", value).unwrap();
                return Ok(());
            }
            Outcome::Suspended(suspension) => {
                writeln!(output.borrow_mut(), "-- yield --").unwrap();
                outcome = engine.resume(suspension)?;
            }
        }
    }
}

#[test]
fn test_scripts() {
    let scripts = WalkDir::new("../tests")
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| matches!(entry.path().extension(), Some(extension) if extension == "crash"))
        .filter_map(|entry| {
            let mut exp_filename = entry.file_name().to_os_string();
            exp_filename.push(".out");

            let exp_filepath = entry.path().parent().unwrap().join(exp_filename);
            if exp_filepath.exists() {
                Some((entry, exp_filepath))
            } else {
                None
            }
        });

    let mut total = 0;

    for (src_path, exp_path) in scripts {
        println!("🕑 Running script: {}", src_path.path().display());

        let src_content = fs::read_to_string(src_path.path()).unwrap();
        let exp_content = fs::read_to_string(exp_path).unwrap();

        let output = Rc::new(RefCell::new(Vec::new()));
        if let Err(err) = run_script(&src_content, &output) {
            writeln!(output.borrow_mut(), "{}", err).unwrap();
        }

        let actual = String::from_utf8(output.borrow().clone()).unwrap();
        assert_eq!(exp_content, actual, "output of {}", src_path.path().display());

        println!("✅ Script complete: {}", src_path.path().display());
        total += 1;
    }

    assert!(total > 0, "no scripts found under ../tests");
    println!("✅ Ran {} scripts", total)
}
