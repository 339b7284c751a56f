//! Data Transfer Objects (DTOs)
//!
//! DTOs are used for API boundaries and use case inputs/outputs.

mod order_dto;

pub use order_dto::{
    ACCEPTED_MESSAGE, CancelOrderResultDto, OrderDetailsDto, OrderHistoryDto,
    OrderHistoryRequestDto, OrderStatusDto, REPLAY_MESSAGE, SubmitOrderDto, SubmitOrderResultDto,
};
