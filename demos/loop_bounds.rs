use clap::{Parser, ValueEnum};

use strdom::*;

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Domain {
    /// `i := 0; while (i < N) { i := i + 1 }` over intervals.
    Interval,
    /// `s := ""; while (*) { s := s + "ab" }` over automata.
    Strings,
    /// `j := i + 1; while (*) { i := j; j := i + 1 }` over strict upper bounds.
    UpperBounds,
}

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Abstract domain to run the loop in.
    #[arg(value_enum, default_value = "interval")]
    domain: Domain,

    /// Loop bound `N`.
    #[arg(long, value_name = "INT", default_value = "10")]
    bound: i64,

    /// Iterations that join before widening kicks in.
    #[arg(long, value_name = "INT", default_value = "1")]
    delay: usize,

    /// Give up after this many iterations.
    #[arg(long, value_name = "INT", default_value = "100")]
    max_iterations: usize,
}

fn report<D: ValueDomain>(result: &Fixpoint<D>) {
    println!("converged = {} after {} iterations", result.converged, result.iterations);
    println!("head:\n{}", result.head.representation());
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let time_total = std::time::Instant::now();

    let args = Cli::parse();
    println!("args = {:?}", args);

    let pp = ProgramPoint::new(1);
    let engine = FixpointEngine::new(args.delay, args.max_iterations);

    match args.domain {
        Domain::Interval => {
            let i = Identifier::int("i");
            let ei = ValueExpr::var(i.clone());
            let guard = ei.clone().less(ValueExpr::int(args.bound));

            let entry = IntervalEnvironment::top().assign(&i, &ValueExpr::int(0), pp)?;
            let result = engine.loop_head(&entry, |s| s.assume(&guard, pp)?.assign(&i, &ei.clone().add(ValueExpr::int(1)), pp))?;
            report(&result);

            let exit = result.head.assume(&guard.not(), pp)?;
            println!("exit: i = {}", exit.get(&i));
        }
        Domain::Strings => {
            let s = Identifier::string("s");
            let n = Identifier::int("n");
            let es = ValueExpr::var(s.clone());

            let entry = StringNumericEnvironment::top().assign(&s, &ValueExpr::string(""), pp)?;
            let result = engine.loop_head(&entry, |st| st.assign(&s, &es.clone().concat(ValueExpr::string("ab")), pp))?;
            report(&result);

            let after = result.head.assign(&n, &es.clone().length(), pp)?;
            println!("length(s) = {}", after.get(&n));
            for needle in ["ab", "ba", "aa"] {
                let verdict = after.satisfies(&es.clone().contains(ValueExpr::string(needle)), pp)?;
                println!("contains(s, {:?}) = {}", needle, verdict);
            }
        }
        Domain::UpperBounds => {
            let i = Identifier::int("i");
            let j = Identifier::int("j");
            let (ei, ej) = (ValueExpr::var(i.clone()), ValueExpr::var(j.clone()));

            let entry = StrictUpperBounds::top().assign(&j, &ei.clone().add(ValueExpr::int(1)), pp)?;
            let result = engine.loop_head(&entry, |st| {
                st.assign(&i, &ej, pp)?.assign(&j, &ei.clone().add(ValueExpr::int(1)), pp)
            })?;
            report(&result);
            println!("i < j: {}", result.head.satisfies(&ei.less(ej), pp)?);
        }
    }

    let time_total = time_total.elapsed();
    println!("\nAll done in {:.3} s", time_total.as_secs_f64());

    Ok(())
}
