use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen_futures::spawn_local;
use yew::prelude::*;
use yew_router::prelude::*;

use super::AuthContext;
use crate::services::impersonation::{session_store, BrowserSignOut, BrowserStorage};
use crate::Route;
use garageinn_shared::impersonation::{
    attach_reconciler, exit_impersonation, AuthBroadcast, AuthSnapshot, ExitOutcome,
    ImpersonationState, Navigator, Reconciler,
};

#[derive(Clone, Debug, PartialEq)]
pub struct ImpersonationContext {
    pub state: ImpersonationState,
    pub exit: Callback<()>,
}

/// Sends the browser to the login page, through the router when one is mounted.
struct LoginRedirect(Option<yew_router::navigator::Navigator>);

impl Navigator for LoginRedirect {
    fn to_login(&self) {
        match &self.0 {
            Some(navigator) => navigator.push(&Route::Login),
            None => {
                if let Some(window) = web_sys::window() {
                    if let Err(e) = window.location().assign(&Route::Login.to_path()) {
                        tracing::error!(error = ?e, "could not navigate to login");
                    }
                }
            }
        }
    }
}

#[derive(Properties, PartialEq)]
pub struct ImpersonationProviderProps {
    pub children: Children,
}

#[function_component(ImpersonationProvider)]
pub fn impersonation_provider(props: &ImpersonationProviderProps) -> Html {
    let auth_ctx = use_context::<AuthContext>().expect("AuthContext not found");
    let navigator = use_navigator();
    let state = use_state_eq(ImpersonationState::inactive);
    let notice = use_state_eq(|| None::<String>);

    let broadcast = use_memo((), |_| AuthBroadcast::new(AuthSnapshot::loading()));
    let reconciler = use_memo((), |_| {
        Rc::new(RefCell::new(Reconciler::<BrowserStorage>::new(session_store())))
    });

    {
        let broadcast = broadcast.clone();
        let reconciler = reconciler.clone();
        let state = state.clone();
        use_effect_with((), move |_| {
            let subscription = attach_reconciler(&*broadcast, (*reconciler).clone(), move |next| {
                state.set(next.clone())
            });
            move || subscription.unsubscribe()
        });
    }

    {
        let snapshot = AuthSnapshot {
            user_id: auth_ctx.user_id(),
            is_loading: auth_ctx.is_loading,
        };
        let broadcast = broadcast.clone();
        use_effect_with(snapshot, move |snapshot| {
            broadcast.publish(snapshot.clone());
            || ()
        });
    }

    let exit = {
        let reconciler = reconciler.clone();
        let signed_out = auth_ctx.signed_out.clone();
        let notice = notice.clone();
        Callback::from(move |_| {
            let store = reconciler.borrow().store().clone();
            let sign_out = BrowserSignOut::new(signed_out.clone());
            let redirect = LoginRedirect(navigator.clone());
            let notice = notice.clone();

            notice.set(None);
            spawn_local(async move {
                if let ExitOutcome::SignOutFailed(message) =
                    exit_impersonation(&store, &sign_out, &redirect).await
                {
                    notice.set(Some(format!(
                        "Signed out locally, but the server reported: {}",
                        message
                    )));
                }
            });
        })
    };

    let context = ImpersonationContext {
        state: (*state).clone(),
        exit,
    };

    html! {
        <ContextProvider<ImpersonationContext> {context}>
            if let Some(message) = (*notice).clone() {
                <div class="bg-yellow-50 border-b border-yellow-200 text-yellow-800 px-4 py-2 text-sm">
                    {message}
                </div>
            }
            {props.children.clone()}
        </ContextProvider<ImpersonationContext>>
    }
}

/// Shown while an admin is viewing the app as another user.
#[function_component(ImpersonationBanner)]
pub fn impersonation_banner() -> Html {
    let Some(ctx) = use_context::<ImpersonationContext>() else {
        return html! {};
    };

    if !ctx.state.is_impersonating {
        return html! {};
    }

    let name = ctx
        .state
        .impersonated_user_name
        .clone()
        .unwrap_or_else(|| "another user".to_string());
    let onclick = {
        let exit = ctx.exit.clone();
        Callback::from(move |_: MouseEvent| exit.emit(()))
    };

    html! {
        <div class="bg-orange-600 text-white px-4 py-2 flex items-center justify-between">
            <span class="text-sm">
                {"Viewing as "}<span class="font-semibold">{name}</span>
            </span>
            <button
                {onclick}
                class="bg-white text-orange-700 hover:bg-orange-100 px-3 py-1 rounded text-sm font-medium"
            >
                {"Return to my account"}
            </button>
        </div>
    }
}
