use wasm_bindgen_futures::spawn_local;
use yew::prelude::*;
use yew_router::prelude::*;

use super::{AuthContext, ImpersonationBanner};
use crate::services::auth;
use crate::Route;
use garageinn_shared::UserRole;

#[derive(Properties, PartialEq)]
pub struct LayoutProps {
    pub children: Html,
}

#[function_component(Layout)]
pub fn layout(props: &LayoutProps) -> Html {
    let auth_ctx = use_context::<AuthContext>().expect("AuthContext not found");
    let current_route = use_route::<Route>().unwrap_or(Route::Dashboard);

    let can_list_users = auth_ctx
        .user
        .as_ref()
        .is_some_and(|user| matches!(user.role, UserRole::Admin | UserRole::Manager));

    let on_sign_out = {
        let signed_out = auth_ctx.signed_out.clone();
        Callback::from(move |_: MouseEvent| {
            let signed_out = signed_out.clone();
            spawn_local(async move {
                if let Err(e) = auth::logout().await {
                    tracing::warn!(error = %e, "server sign-out failed");
                }
                signed_out.emit(());
            });
        })
    };

    let user_name = auth_ctx
        .user
        .as_ref()
        .map(|user| user.name.clone())
        .unwrap_or_default();

    html! {
        <div class="min-h-screen bg-gray-900 flex flex-col">
            <ImpersonationBanner />

            <header class="bg-gray-800 border-b border-gray-700 h-14 flex-shrink-0">
                <div class="h-full flex items-center justify-between px-4">
                    <div class="flex items-center space-x-6">
                        <div class="flex items-center space-x-2">
                            <div class="w-8 h-8 bg-blue-500 rounded flex items-center justify-center">
                                <span class="text-white font-bold text-lg">{"G"}</span>
                            </div>
                            <span class="text-white font-semibold text-lg">{"GarageInn"}</span>
                        </div>

                        <nav class="flex items-center space-x-1">
                            <NavTab route={Route::Dashboard} label="Home" current={current_route.clone()} />
                            if can_list_users {
                                <NavTab route={Route::Users} label="Users" current={current_route.clone()} />
                            }
                        </nav>
                    </div>

                    <div class="flex items-center space-x-4">
                        <span class="text-gray-300 text-sm">{user_name}</span>
                        <button
                            onclick={on_sign_out}
                            class="text-gray-300 hover:text-white text-sm"
                        >
                            {"Sign out"}
                        </button>
                    </div>
                </div>
            </header>

            <main class="flex-1 overflow-auto">
                {props.children.clone()}
            </main>
        </div>
    }
}

#[derive(Properties, PartialEq)]
struct NavTabProps {
    route: Route,
    label: AttrValue,
    current: Route,
}

#[function_component(NavTab)]
fn nav_tab(props: &NavTabProps) -> Html {
    let classes = if props.route == props.current {
        "bg-gray-700 text-white px-3 py-1.5 rounded text-sm font-medium"
    } else {
        "text-gray-300 hover:bg-gray-700 hover:text-white px-3 py-1.5 rounded text-sm font-medium"
    };

    html! {
        <Link<Route> to={props.route.clone()} classes={classes}>
            {props.label.clone()}
        </Link<Route>>
    }
}
