use crate::core::builder::ImageBuilder;
use crate::core::image::{load_image, ImageLayout};
use crate::core::launcher::{launch, prepare_launch};
use crate::domain::model::{BootstrapState, BuildReport};
use crate::domain::ports::Installer;
use crate::utils::error::{BootstrapError, Result};

/// Tracks the forward-only lifecycle of one image.
#[derive(Debug)]
pub struct Lifecycle {
    state: BootstrapState,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: BootstrapState::Unbuilt,
        }
    }

    /// Lifecycle of an image that already exists on disk.
    pub fn built() -> Self {
        Self {
            state: BootstrapState::Built,
        }
    }

    pub fn state(&self) -> BootstrapState {
        self.state
    }

    pub fn advance(&mut self, next: BootstrapState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(BootstrapError::InvalidState {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        tracing::debug!("State: {} -> {}", self.state, next);
        self.state = next;
        Ok(())
    }

    /// 失敗一律是終止狀態，不重試
    fn fail(&mut self) {
        if self.state.can_transition_to(BootstrapState::Failed) {
            self.state = BootstrapState::Failed;
        }
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

pub struct BootstrapEngine<I: Installer> {
    builder: ImageBuilder<I>,
    lifecycle: Lifecycle,
}

impl<I: Installer> BootstrapEngine<I> {
    pub fn new(builder: ImageBuilder<I>) -> Self {
        Self {
            builder,
            lifecycle: Lifecycle::new(),
        }
    }

    pub fn state(&self) -> BootstrapState {
        self.lifecycle.state()
    }

    pub fn layout(&self) -> ImageLayout {
        self.builder.layout()
    }

    pub async fn build(&mut self) -> Result<BuildReport> {
        self.lifecycle.advance(BootstrapState::Building)?;

        match self.builder.build().await {
            Ok(report) => {
                self.lifecycle.advance(BootstrapState::Built)?;
                Ok(report)
            }
            Err(e) => {
                self.lifecycle.fail();
                Err(e)
            }
        }
    }

    /// Launches the image built by [`BootstrapEngine::build`].
    pub async fn run(&mut self, overrides: &[(String, String)]) -> Result<i32> {
        run_with(&mut self.lifecycle, &self.builder.layout(), overrides).await
    }
}

/// Launches an image directory produced by an earlier build.
pub async fn run_image(layout: &ImageLayout, overrides: &[(String, String)]) -> Result<i32> {
    let mut lifecycle = Lifecycle::built();
    run_with(&mut lifecycle, layout, overrides).await
}

async fn run_with(
    lifecycle: &mut Lifecycle,
    layout: &ImageLayout,
    overrides: &[(String, String)],
) -> Result<i32> {
    if lifecycle.state() != BootstrapState::Built {
        return Err(BootstrapError::InvalidState {
            from: lifecycle.state().to_string(),
            to: BootstrapState::Running.to_string(),
        });
    }

    let plan = match load_image(layout)
        .await
        .and_then(|image| prepare_launch(layout, &image, overrides))
    {
        Ok(plan) => plan,
        Err(e) => {
            lifecycle.fail();
            return Err(e);
        }
    };

    lifecycle.advance(BootstrapState::Running)?;
    match launch(&plan).await {
        Ok(code) => {
            lifecycle.advance(BootstrapState::Exited(code))?;
            Ok(code)
        }
        Err(e) => {
            // 行程沒啟動成功，視為以對應結束碼退出
            lifecycle.advance(BootstrapState::Exited(e.exit_code()))?;
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_rejects_backward_transitions() {
        let mut lifecycle = Lifecycle::new();
        lifecycle.advance(BootstrapState::Building).unwrap();
        lifecycle.advance(BootstrapState::Built).unwrap();

        let err = lifecycle.advance(BootstrapState::Building).unwrap_err();
        assert!(matches!(err, BootstrapError::InvalidState { .. }));
        assert_eq!(lifecycle.state(), BootstrapState::Built);
    }

    #[test]
    fn test_failure_is_terminal() {
        let mut lifecycle = Lifecycle::new();
        lifecycle.advance(BootstrapState::Building).unwrap();
        lifecycle.fail();

        assert_eq!(lifecycle.state(), BootstrapState::Failed);
        assert!(lifecycle.advance(BootstrapState::Built).is_err());
    }

    #[test]
    fn test_run_requires_built_image() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut lifecycle = Lifecycle::new();

        let err = tokio_test::block_on(run_with(&mut lifecycle, &ImageLayout::new(dir.path()), &[]))
            .unwrap_err();
        assert!(matches!(err, BootstrapError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn test_run_image_without_build_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = run_image(&ImageLayout::new(dir.path()), &[]).await.unwrap_err();
        assert!(matches!(err, BootstrapError::ImageNotBuilt { .. }));
        assert_eq!(err.exit_code(), 1);
    }
}
