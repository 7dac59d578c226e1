use cadence::driver;
use cadence_utils::CadenceResult;

fn main() -> CadenceResult<()> {
    driver::run_compiler()
}
