use wasm_bindgen_futures::spawn_local;
use yew::prelude::*;

use crate::components::AuthContext;
use crate::services::{impersonation, users};
use garageinn_shared::{UserRole, UserSummary};

/// Whether `viewer` may be offered "View as" for `target`. The server makes
/// the final decision.
pub fn can_view_as(viewer: &UserSummary, impersonating: bool, target: &UserSummary) -> bool {
    !impersonating
        && viewer.role == UserRole::Admin
        && viewer.id != target.id
        && target.is_active
        && viewer.role.outranks(&target.role)
}

#[function_component(UsersPage)]
pub fn users_page() -> Html {
    let auth_ctx = use_context::<AuthContext>().expect("AuthContext not found");
    let user_list = use_state(|| None::<Vec<UserSummary>>);
    let error_message = use_state(|| None::<String>);
    let pending = use_state(|| None::<String>);

    {
        let user_list = user_list.clone();
        let error_message = error_message.clone();
        use_effect_with((), move |_| {
            spawn_local(async move {
                match users::list().await {
                    Ok(list) => user_list.set(Some(list)),
                    Err(e) => error_message.set(Some(e.message)),
                }
            });
            || ()
        });
    }

    let on_view_as = {
        let current_user_id = auth_ctx.user_id();
        let error_message = error_message.clone();
        let pending = pending.clone();
        Callback::from(move |target: UserSummary| {
            let current_user_id = current_user_id.clone();
            let error_message = error_message.clone();
            let pending = pending.clone();
            let target_id = target.id.to_string();

            pending.set(Some(target_id.clone()));
            error_message.set(None);

            spawn_local(async move {
                let service = impersonation::service(current_user_id.clone());
                let result = service
                    .impersonate_user(&target_id, current_user_id.as_deref().unwrap_or_default())
                    .await;

                match result {
                    Ok(response) => {
                        if let Some(window) = web_sys::window() {
                            if let Err(e) = window.location().assign(&response.link) {
                                tracing::error!(error = ?e, "could not follow impersonation link");
                            }
                        }
                    }
                    Err(e) => {
                        pending.set(None);
                        error_message.set(Some(e.to_string()));
                    }
                }
            });
        })
    };

    let viewer = auth_ctx.user.clone();
    let impersonating = auth_ctx.impersonated_by.is_some();

    html! {
        <div class="p-6">
            <h1 class="text-2xl font-bold text-white mb-4">{"Users"}</h1>

            if let Some(error) = (*error_message).clone() {
                <div class="bg-red-50 border border-red-200 text-red-700 px-4 py-3 rounded mb-4">
                    {error}
                </div>
            }

            {
                match (*user_list).clone() {
                    None => html! { <p class="text-gray-400">{"Loading users..."}</p> },
                    Some(list) => html! {
                        <table class="min-w-full bg-gray-800 rounded-lg overflow-hidden">
                            <thead class="bg-gray-700">
                                <tr>
                                    <th class="px-4 py-2 text-left text-xs font-medium text-gray-300 uppercase">{"Name"}</th>
                                    <th class="px-4 py-2 text-left text-xs font-medium text-gray-300 uppercase">{"Email"}</th>
                                    <th class="px-4 py-2 text-left text-xs font-medium text-gray-300 uppercase">{"Role"}</th>
                                    <th class="px-4 py-2"></th>
                                </tr>
                            </thead>
                            <tbody class="divide-y divide-gray-700">
                                { for list.into_iter().map(|user| {
                                    let offer = viewer
                                        .as_ref()
                                        .is_some_and(|viewer| can_view_as(viewer, impersonating, &user));
                                    let busy = pending.as_deref() == Some(user.id.to_string().as_str());
                                    let onclick = {
                                        let on_view_as = on_view_as.clone();
                                        let user = user.clone();
                                        Callback::from(move |_: MouseEvent| on_view_as.emit(user.clone()))
                                    };

                                    html! {
                                        <tr key={user.id.to_string()}>
                                            <td class="px-4 py-2 text-white">{user.name.clone()}</td>
                                            <td class="px-4 py-2 text-gray-300">{user.email.clone()}</td>
                                            <td class="px-4 py-2 text-gray-300">{user.role.display_name()}</td>
                                            <td class="px-4 py-2 text-right">
                                                if offer {
                                                    <button
                                                        {onclick}
                                                        disabled={pending.is_some()}
                                                        class="bg-blue-600 hover:bg-blue-700 text-white px-3 py-1 rounded text-sm disabled:opacity-50"
                                                    >
                                                        if busy { {"Opening..."} } else { {"View as"} }
                                                    </button>
                                                }
                                            </td>
                                        </tr>
                                    }
                                }) }
                            </tbody>
                        </table>
                    },
                }
            }
        </div>
    }
}
