//! Demo skill: resolve a patient's hospital id from their name

use std::process::ExitCode;

use clap::Parser;
use skillrun::skills::{self, SkillError, RESOLVE_PATIENT_ID};

#[derive(Parser, Debug)]
#[command(name = "resolve-patient-id", about = "Resolve a patient id from a name")]
struct Args {
    /// Skill input, e.g. '{"inputArgs": {"name": "John"}}'
    input: Option<String>,

    /// Print the skill descriptor instead of running
    #[arg(long)]
    describe: bool,
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if !e.use_stderr() => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(_) => return fail(SkillError::Usage(RESOLVE_PATIENT_ID)),
    };

    if args.describe {
        let descriptor = skills::descriptors()
            .into_iter()
            .find(|d| d.name == RESOLVE_PATIENT_ID);
        println!("{}", serde_json::to_string_pretty(&descriptor).unwrap_or_default());
        return ExitCode::SUCCESS;
    }

    let Some(input) = args.input else {
        return fail(SkillError::Usage(RESOLVE_PATIENT_ID));
    };

    match skills::resolve_patient_id(&input) {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output).unwrap_or_default());
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

fn fail(err: SkillError) -> ExitCode {
    eprintln!("{err}");
    ExitCode::from(err.resolve_exit_code())
}
