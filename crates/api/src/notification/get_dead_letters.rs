use crate::{
    error::NotifierError,
    shared::usecase::{execute, UseCase},
};
use actix_web::{web, HttpResponse};
use booking_notifier_api_structs::get_dead_letters::*;
use booking_notifier_domain::DeadLetterRecord;
use booking_notifier_infra::NotifierContext;

pub async fn get_dead_letters_controller(
    ctx: web::Data<NotifierContext>,
) -> Result<HttpResponse, NotifierError> {
    let usecase = GetDeadLettersUseCase {};

    execute(usecase, &ctx)
        .await
        .map(|records| HttpResponse::Ok().json(APIResponse::new(records)))
        .map_err(|_| NotifierError::InternalError)
}

#[derive(Debug)]
pub struct GetDeadLettersUseCase {}

#[derive(Debug)]
pub enum UseCaseErrors {
    StorageError,
}

#[async_trait::async_trait(?Send)]
impl UseCase for GetDeadLettersUseCase {
    type Response = Vec<DeadLetterRecord>;

    type Errors = UseCaseErrors;

    const NAME: &'static str = "GetDeadLetters";

    async fn execute(&mut self, ctx: &NotifierContext) -> Result<Self::Response, Self::Errors> {
        ctx.repos
            .dead_letters
            .find_all()
            .await
            .map_err(|_| UseCaseErrors::StorageError)
    }
}
