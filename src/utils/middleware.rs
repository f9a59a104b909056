use salvo::prelude::*;

use crate::state::AppState;

pub struct StateInjector {
    state: AppState,
}

#[async_trait]
impl Handler for StateInjector {
    async fn handle(
        &self,
        _req: &mut Request,
        depot: &mut Depot,
        _res: &mut Response,
        _ctrl: &mut FlowCtrl,
    ) {
        depot.inject(self.state.clone());
    }
}

pub fn inject_state(state: AppState) -> StateInjector {
    StateInjector { state }
}

pub fn get_app_state(depot: &Depot) -> Result<&AppState, crate::error::AppError> {
    depot
        .obtain::<AppState>()
        .map_err(|_| crate::error::AppError::Config("application state not available".into()))
}
