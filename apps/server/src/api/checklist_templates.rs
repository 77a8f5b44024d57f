//! Checklist template administration (ADMIN).

use actix_web::{HttpResponse, web};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::api::forms::{ErrorQuery, or_back, redirect};
use crate::auth::Session;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::{ChecklistTemplateForm, JobType};
use crate::views::{Views, page};

/// Validated name, job type and lines of a template form.
fn parse_form(form: &ChecklistTemplateForm) -> AppResult<(JobType, Vec<String>)> {
    form.validate()?;
    let job_type = JobType::parse(&form.job_type)
        .ok_or_else(|| AppError::InvalidInput(format!("Unknown job type '{}'", form.job_type)))?;
    let lines = form.item_lines();
    if lines.is_empty() {
        return Err(AppError::InvalidInput(
            "items needs at least one line".to_string(),
        ));
    }
    Ok((job_type, lines))
}

async fn list_templates(
    session: Session,
    pool: web::Data<DbPool>,
    views: web::Data<Views>,
    query: web::Query<ErrorQuery>,
) -> AppResult<HttpResponse> {
    session.require_admin()?;
    let templates = pool.list_checklist_templates().await?;
    views.render(
        "checklist_templates",
        &page(
            Some(&session),
            "Checklist templates",
            query.error.as_deref(),
            json!({ "templates": templates, "job_types": JobType::ALL }),
        ),
    )
}

async fn create_template(
    session: Session,
    pool: web::Data<DbPool>,
    form: web::Form<ChecklistTemplateForm>,
) -> AppResult<HttpResponse> {
    session.require_admin()?;
    let result: AppResult<HttpResponse> = async {
        let (job_type, lines) = parse_form(&form)?;
        let template = pool
            .insert_checklist_template(&form.name, job_type, lines)
            .await?;
        Ok(redirect(&format!("/checklist-templates/{}", template.id)))
    }
    .await;
    or_back(result, "/checklist-templates")
}

async fn edit_template(
    session: Session,
    pool: web::Data<DbPool>,
    views: web::Data<Views>,
    path: web::Path<Uuid>,
    query: web::Query<ErrorQuery>,
) -> AppResult<HttpResponse> {
    session.require_admin()?;
    let template = pool.get_checklist_template(path.into_inner()).await?;
    let lines = template.items.join("\n");
    views.render(
        "checklist_template_edit",
        &page(
            Some(&session),
            &template.name,
            query.error.as_deref(),
            json!({ "template": template, "lines": lines, "job_types": JobType::ALL }),
        ),
    )
}

async fn update_template(
    session: Session,
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
    form: web::Form<ChecklistTemplateForm>,
) -> AppResult<HttpResponse> {
    session.require_admin()?;
    let id = path.into_inner();
    let back = format!("/checklist-templates/{}", id);
    let result: AppResult<HttpResponse> = async {
        let (job_type, lines) = parse_form(&form)?;
        pool.update_checklist_template(id, &form.name, job_type, lines)
            .await?;
        Ok(redirect("/checklist-templates"))
    }
    .await;
    or_back(result, &back)
}

async fn delete_template(
    session: Session,
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    session.require_admin()?;
    pool.delete_checklist_template(path.into_inner()).await?;
    Ok(redirect("/checklist-templates"))
}

/// Configure checklist template routes.
pub fn configure_checklist_template_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/checklist-templates")
            .route(web::get().to(list_templates))
            .route(web::post().to(create_template)),
    )
    .service(
        web::resource("/checklist-templates/{id}")
            .route(web::get().to(edit_template))
            .route(web::post().to(update_template)),
    )
    .service(
        web::resource("/checklist-templates/{id}/delete").route(web::post().to(delete_template)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(job_type: &str, items: &str) -> ChecklistTemplateForm {
        ChecklistTemplateForm {
            name: "Quarterly PM".to_string(),
            job_type: job_type.to_string(),
            items: items.to_string(),
        }
    }

    #[test]
    fn test_parse_form_splits_lines() {
        let (job_type, lines) =
            parse_form(&form("pm", "Clean filters\n\n  Check refrigerant pressure \n")).unwrap();
        assert_eq!(job_type, JobType::Pm);
        assert_eq!(lines, vec!["Clean filters", "Check refrigerant pressure"]);
    }

    #[test]
    fn test_parse_form_rejects_blank_lines_only() {
        assert!(parse_form(&form("PM", " \n \n")).unwrap_err().is_validation());
        assert!(parse_form(&form("REPAIR", "Clean filters")).unwrap_err().is_validation());
    }
}
