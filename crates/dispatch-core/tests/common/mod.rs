#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use dispatch_core::{
    Action, ActionHandler, DispatchError, DispatchResult, ExecutionContext, SessionValidator,
};

/// Shared record of every handler call, in call order.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

#[derive(Default)]
pub struct AdminOnly;

impl SessionValidator for AdminOnly {
    fn is_valid(&self, session_id: Option<&str>) -> bool {
        session_id == Some("admin")
    }
}

// --- widgets ---------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct CreateWidget {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WidgetId {
    pub id: u64,
}

impl Action for CreateWidget {
    type Result = WidgetId;
}

#[derive(Default)]
pub struct CreateWidgetHandler {
    pub journal: Journal,
    pub undone: Arc<Mutex<Vec<(CreateWidget, WidgetId)>>>,
    pub fail_undo: bool,
}

#[async_trait]
impl ActionHandler<CreateWidget> for CreateWidgetHandler {
    async fn execute(
        &self,
        action: &CreateWidget,
        _ctx: &ExecutionContext,
    ) -> DispatchResult<WidgetId> {
        self.journal.push(format!("create {}", action.name));
        Ok(WidgetId { id: 42 })
    }

    async fn undo(
        &self,
        action: &CreateWidget,
        result: &WidgetId,
        _ctx: &ExecutionContext,
    ) -> DispatchResult<()> {
        self.journal
            .push(format!("undo create {} -> {}", action.name, result.id));
        self.undone
            .lock()
            .unwrap()
            .push((action.clone(), result.clone()));
        if self.fail_undo {
            return Err(anyhow::anyhow!("widget store refused the delete").into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteWidget {
    pub id: u64,
}

impl Action for DeleteWidget {
    type Result = ();
}

pub struct DeleteWidgetHandler {
    pub journal: Journal,
}

#[async_trait]
impl ActionHandler<DeleteWidget> for DeleteWidgetHandler {
    async fn execute(&self, action: &DeleteWidget, _ctx: &ExecutionContext) -> DispatchResult<()> {
        self.journal.push(format!("delete {}", action.id));
        Ok(())
    }

    async fn undo(
        &self,
        action: &DeleteWidget,
        _result: &(),
        _ctx: &ExecutionContext,
    ) -> DispatchResult<()> {
        self.journal.push(format!("undo delete {}", action.id));
        Ok(())
    }
}

/// Creates one widget and deletes another within a single request.
#[derive(Debug, Clone)]
pub struct ReplaceWidget {
    pub create: String,
    pub delete: u64,
}

impl Action for ReplaceWidget {
    type Result = WidgetId;
}

pub struct ReplaceWidgetHandler;

#[async_trait]
impl ActionHandler<ReplaceWidget> for ReplaceWidgetHandler {
    async fn execute(
        &self,
        action: &ReplaceWidget,
        ctx: &ExecutionContext,
    ) -> DispatchResult<WidgetId> {
        let created = ctx
            .execute(CreateWidget {
                name: action.create.clone(),
            })
            .await?;
        ctx.execute(DeleteWidget { id: action.delete }).await?;
        Ok(created)
    }

    async fn undo(
        &self,
        _action: &ReplaceWidget,
        _result: &WidgetId,
        _ctx: &ExecutionContext,
    ) -> DispatchResult<()> {
        Ok(())
    }
}

// --- steps -----------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Step(pub String);

impl Step {
    pub fn new(label: &str) -> Self {
        Self(label.to_string())
    }
}

impl Action for Step {
    type Result = String;
}

#[derive(Default)]
pub struct StepHandler {
    pub journal: Journal,
    /// Labels whose undo fails.
    pub fail_undo: Vec<String>,
    /// Labels whose undo is refused with an action error.
    pub refuse_undo: Vec<String>,
}

#[async_trait]
impl ActionHandler<Step> for StepHandler {
    async fn execute(&self, action: &Step, _ctx: &ExecutionContext) -> DispatchResult<String> {
        self.journal.push(format!("exec {}", action.0));
        Ok(action.0.clone())
    }

    async fn undo(&self, action: &Step, _result: &String, _ctx: &ExecutionContext) -> DispatchResult<()> {
        self.journal.push(format!("undo {}", action.0));
        if self.fail_undo.contains(&action.0) {
            return Err(anyhow::anyhow!("cannot undo {}", action.0).into());
        }
        if self.refuse_undo.contains(&action.0) {
            return Err(DispatchError::action(format!("{} is locked", action.0)));
        }
        Ok(())
    }
}

/// How a [`Fail`] action fails.
#[derive(Debug, Clone, PartialEq)]
pub enum Fault {
    Rejected(String),
    Crashed(String),
    Io(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fail(pub Fault);

impl Action for Fail {
    type Result = ();
}

pub struct FailHandler;

#[async_trait]
impl ActionHandler<Fail> for FailHandler {
    async fn execute(&self, action: &Fail, _ctx: &ExecutionContext) -> DispatchResult<()> {
        match &action.0 {
            Fault::Rejected(message) => Err(DispatchError::action(message.clone())),
            Fault::Crashed(message) => Err(anyhow::anyhow!("{message}").into()),
            Fault::Io(message) => Err(anyhow::Error::new(std::io::Error::new(
                std::io::ErrorKind::Other,
                message.clone(),
            ))
            .into()),
        }
    }

    async fn undo(&self, _action: &Fail, _result: &(), _ctx: &ExecutionContext) -> DispatchResult<()> {
        Ok(())
    }
}

/// Executes its steps in order, then optionally a failing action.
#[derive(Debug, Clone)]
pub struct Sequence {
    pub steps: Vec<Step>,
    pub then: Option<Fail>,
}

impl Action for Sequence {
    type Result = Vec<String>;
}

pub struct SequenceHandler;

#[async_trait]
impl ActionHandler<Sequence> for SequenceHandler {
    async fn execute(
        &self,
        action: &Sequence,
        ctx: &ExecutionContext,
    ) -> DispatchResult<Vec<String>> {
        let mut done = Vec::new();
        for step in &action.steps {
            done.push(ctx.execute(step.clone()).await?);
        }
        if let Some(fail) = &action.then {
            ctx.execute(fail.clone()).await?;
        }
        Ok(done)
    }

    async fn undo(
        &self,
        action: &Sequence,
        _result: &Vec<String>,
        ctx: &ExecutionContext,
    ) -> DispatchResult<()> {
        for step in action.steps.iter().rev() {
            ctx.undo(step.clone(), step.0.clone()).await?;
        }
        Ok(())
    }
}

/// Undoes a step inside a request, then optionally fails.
#[derive(Debug, Clone)]
pub struct Revert {
    pub step: Step,
    pub then: Option<Fail>,
}

impl Action for Revert {
    type Result = ();
}

pub struct RevertHandler;

#[async_trait]
impl ActionHandler<Revert> for RevertHandler {
    async fn execute(&self, action: &Revert, ctx: &ExecutionContext) -> DispatchResult<()> {
        ctx.undo(action.step.clone(), action.step.0.clone()).await?;
        if let Some(fail) = &action.then {
            ctx.execute(fail.clone()).await?;
        }
        Ok(())
    }

    async fn undo(&self, _action: &Revert, _result: &(), _ctx: &ExecutionContext) -> DispatchResult<()> {
        Ok(())
    }
}

/// Never registered anywhere.
#[derive(Debug, Clone)]
pub struct Unregistered;

impl Action for Unregistered {
    type Result = ();
}
