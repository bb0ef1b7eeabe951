use async_trait::async_trait;

/// A synchronous pipeline task. Blocking tasks should be cheap,
/// cpu bound steps such as request validation or lookups against
/// in memory state. Anything which suspends belongs on [`AsyncTask`]
pub trait BlockingTask<C, E>: Send + Sync
where
    C: Send + Sync,
{
    fn run(&self, context: &C) -> Result<(), E>;
}

/// An asynchronous pipeline task which may suspend, e.g. for
/// outbound http calls or channel sends
#[async_trait]
pub trait AsyncTask<C, E>: Send + Sync
where
    C: Send + Sync,
{
    async fn run(&self, context: &C) -> Result<(), E>;
}

enum Task<C: Send + Sync, E> {
    Blocking(Box<dyn BlockingTask<C, E>>),
    Async(Box<dyn AsyncTask<C, E>>),
}

/// An ordered list of tasks sharing a single context value.
///
/// # Behavior
/// Tasks run strictly in the order they were added. The first task
/// to return an error aborts the remainder of the pipeline and the
/// error is returned to the caller. Tasks communicate exclusively
/// through interior mutability on the shared context.
pub struct Pipeline<C: Send + Sync, E> {
    tasks: Vec<Task<C, E>>,
}

impl<C: Send + Sync, E> Pipeline<C, E> {
    pub async fn run(&self, context: &C) -> Result<(), E> {
        for task in &self.tasks {
            match task {
                Task::Blocking(task) => task.run(context)?,
                Task::Async(task) => task.run(context).await?,
            }
        }

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Builder for a [`Pipeline`]. The chainable `with_*` methods suit
/// declarative wiring, the `add_*` methods suit conditional wiring
pub struct PipelineBuilder<C: Send + Sync, E> {
    tasks: Vec<Task<C, E>>,
}

impl<C: Send + Sync, E> PipelineBuilder<C, E> {
    pub fn new() -> Self {
        PipelineBuilder { tasks: Vec::new() }
    }

    pub fn with_blocking(mut self, task: Box<dyn BlockingTask<C, E>>) -> Self {
        self.tasks.push(Task::Blocking(task));
        self
    }

    pub fn with_async(mut self, task: Box<dyn AsyncTask<C, E>>) -> Self {
        self.tasks.push(Task::Async(task));
        self
    }

    pub fn add_blocking(&mut self, task: Box<dyn BlockingTask<C, E>>) {
        self.tasks.push(Task::Blocking(task));
    }

    pub fn add_async(&mut self, task: Box<dyn AsyncTask<C, E>>) {
        self.tasks.push(Task::Async(task));
    }

    /// Returns `None` if no tasks were added, as an empty pipeline
    /// is almost always a wiring mistake the caller should decide on
    pub fn build(self) -> Option<Pipeline<C, E>> {
        if self.tasks.is_empty() {
            return None;
        }

        Some(Pipeline { tasks: self.tasks })
    }
}

impl<C: Send + Sync, E> Default for PipelineBuilder<C, E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Error, bail};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter;

    impl BlockingTask<AtomicUsize, Error> for Counter {
        fn run(&self, context: &AtomicUsize) -> Result<(), Error> {
            context.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Failing;

    impl BlockingTask<AtomicUsize, Error> for Failing {
        fn run(&self, _context: &AtomicUsize) -> Result<(), Error> {
            bail!("boom")
        }
    }

    struct AsyncCounter;

    #[async_trait]
    impl AsyncTask<AtomicUsize, Error> for AsyncCounter {
        async fn run(&self, context: &AtomicUsize) -> Result<(), Error> {
            context.fetch_add(10, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_empty_builder_returns_none() {
        let pipeline: Option<Pipeline<AtomicUsize, Error>> = PipelineBuilder::new().build();
        assert!(pipeline.is_none());
    }

    #[tokio::test]
    async fn test_tasks_run_in_order() {
        let pipeline = PipelineBuilder::new()
            .with_blocking(Box::new(Counter))
            .with_async(Box::new(AsyncCounter))
            .with_blocking(Box::new(Counter))
            .build()
            .unwrap();

        let context = AtomicUsize::new(0);
        pipeline.run(&context).await.unwrap();

        assert_eq!(context.load(Ordering::SeqCst), 12);
    }

    #[tokio::test]
    async fn test_error_aborts_remaining_tasks() {
        let pipeline = PipelineBuilder::new()
            .with_blocking(Box::new(Counter))
            .with_blocking(Box::new(Failing))
            .with_blocking(Box::new(Counter))
            .build()
            .unwrap();

        let context = AtomicUsize::new(0);
        let res = pipeline.run(&context).await;

        assert!(res.is_err());
        assert_eq!(
            context.load(Ordering::SeqCst),
            1,
            "Only the task before the failure should have run"
        );
    }
}
