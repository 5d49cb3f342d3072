use crate::pipeline::{PipelineError, Result};
use log::info;
use rayon::prelude::*;

/// Configure the global rayon pool; 0 keeps the default of one thread per core
pub fn init_thread_pool(num_threads: usize) -> Result<()> {
    if num_threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build_global()?;
        info!("Using {} threads", num_threads);
    } else {
        info!("Using all available threads");
    }
    Ok(())
}

/// Run `task` for every year in parallel, stopping at the first error.
/// Results come back in the order of `years`.
pub fn for_each_year<T, F>(years: &[i32], task: F) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(i32) -> Result<T> + Sync + Send,
{
    info!(
        "Processing {} years in parallel using {} threads",
        years.len(),
        rayon::current_num_threads()
    );

    years
        .par_iter()
        .map(|&year| {
            task(year).map_err(|e| match e {
                PipelineError::InvalidData(msg) => {
                    PipelineError::InvalidData(format!("{}: {}", year, msg))
                }
                other => other,
            })
        })
        .collect::<Result<Vec<_>>>()
}

/// Apply `task` to each item in parallel, keeping input order
pub fn map_parallel<I, T, F>(items: &[I], task: F) -> Result<Vec<T>>
where
    I: Sync,
    T: Send,
    F: Fn(&I) -> Result<T> + Sync + Send,
{
    items.par_iter().map(|item| task(item)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_each_year_keeps_order() {
        let years: Vec<i32> = (1979..=2015).collect();
        let doubled = for_each_year(&years, |y| Ok(y * 2)).unwrap();
        assert_eq!(doubled.len(), 37);
        assert_eq!(doubled[0], 3958);
        assert_eq!(doubled[36], 4030);
    }

    #[test]
    fn test_for_each_year_tags_errors_with_year() {
        let years = [2000, 2001];
        let result: Result<Vec<()>> = for_each_year(&years, |y| {
            if y == 2001 {
                Err(PipelineError::InvalidData("bad".to_string()))
            } else {
                Ok(())
            }
        });
        match result {
            Err(PipelineError::InvalidData(msg)) => assert_eq!(msg, "2001: bad"),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_map_parallel() {
        let names = ["a", "bb", "ccc"];
        let lens = map_parallel(&names, |s| Ok(s.len())).unwrap();
        assert_eq!(lens, vec![1, 2, 3]);
    }
}
